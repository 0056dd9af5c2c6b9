//! Pure register decoding.

use crate::registers::{Bank, BlockSpec, Encoding, RegisterField, Width};

/// Fixed point register value divided by its scale.
pub fn scaled(raw: u16, scale: u16) -> f64 {
    f64::from(raw) / f64::from(scale)
}

/// Combine a `[low, high]` register pair into one 32 bit word.
///
/// Signedness applies to the whole 32 bit word, never to the halves.
pub fn combine(pair: [u16; 2], encoding: Encoding) -> i64 {
    match encoding {
        Encoding::Unsigned => i64::from(combine_unsigned(pair)),
        Encoding::Signed => i64::from(combine_signed(pair)),
    }
}

pub fn combine_unsigned([low, high]: [u16; 2]) -> u32 {
    u32::from(low) | (u32::from(high) << 16)
}

pub fn combine_signed(pair: [u16; 2]) -> i32 {
    combine_unsigned(pair) as i32
}

/// `width` bits of `value` starting at bit `position`. An empty field
/// is always 0.
pub fn bits(value: u16, position: u8, width: u8) -> u16 {
    assert!(
        u32::from(position) + u32::from(width) <= 16,
        "bit field {}+{} outside a 16 bit register",
        position,
        width
    );
    if width == 0 {
        return 0;
    }
    let mask = ((1u32 << width) - 1) as u16;
    (value >> position) & mask
}

pub fn bit(value: u16, position: u8) -> bool {
    bits(value, position, 1) == 1
}

/// Registers returned by one block read, indexed from `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRegisterBlock {
    bank: Bank,
    start: u16,
    registers: Vec<u16>,
}

impl RawRegisterBlock {
    pub fn new(bank: Bank, start: u16, registers: Vec<u16>) -> Self {
        RawRegisterBlock { bank, start, registers }
    }

    pub fn bank(&self) -> Bank {
        self.bank
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn registers(&self) -> &[u16] {
        &self.registers
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Whether this block is a complete answer to `spec`.
    pub fn satisfies(&self, spec: &BlockSpec) -> bool {
        self.bank == spec.bank && self.start == spec.start && self.len() == usize::from(spec.count)
    }

    fn offset(&self, field: RegisterField) -> usize {
        let width = usize::from(field.width.registers());
        assert!(
            field.bank == self.bank
                && field.address >= self.start
                && usize::from(field.address - self.start) + width <= self.registers.len(),
            "field at {:#06x} ({:?}, {} registers) is outside block {:#06x}+{} ({:?})",
            field.address,
            field.bank,
            width,
            self.start,
            self.registers.len(),
            self.bank
        );
        usize::from(field.address - self.start)
    }

    /// Raw value of a single register field.
    pub fn word(&self, field: RegisterField) -> u16 {
        self.registers[self.offset(field)]
    }

    /// `[low, high]` pair of a double register field.
    pub fn pair(&self, field: RegisterField) -> [u16; 2] {
        let at = self.offset(field);
        [self.registers[at], self.registers[at + 1]]
    }

    /// Integer value of `field` before scaling, honouring width and encoding.
    pub fn integer(&self, field: RegisterField) -> i64 {
        match (field.width, field.encoding) {
            (Width::Single, Encoding::Unsigned) => i64::from(self.word(field)),
            (Width::Single, Encoding::Signed) => i64::from(self.word(field) as i16),
            (Width::Double, encoding) => combine(self.pair(field), encoding),
        }
    }

    /// Fully decoded value of `field`.
    pub fn value(&self, field: RegisterField) -> f64 {
        self.integer(field) as f64 / f64::from(field.scale)
    }

    /// Byte `offset` of the block viewed as big endian register bytes.
    pub fn byte(&self, offset: usize) -> u8 {
        let word = self.registers[offset / 2];
        if offset % 2 == 0 {
            (word >> 8) as u8
        } else {
            word as u8
        }
    }
}
