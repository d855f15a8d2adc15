//! Reference instruction set: a 65C02-family subset.
//!
//! Enough of the matrix to drive the bus, the timer and the interrupt lines
//! from real code. Opcodes outside the subset run as two-cycle no-ops.

use log::trace;

use crate::cpu::{Core, CpuBus};
use crate::state::{Serializable, Serializer};

// Processor status bits
const FLAG_C: u8 = 0x01; // Carry
const FLAG_Z: u8 = 0x02; // Zero
const FLAG_I: u8 = 0x04; // Interrupt disable
const FLAG_D: u8 = 0x08; // Decimal
const FLAG_B: u8 = 0x10; // Break
const FLAG_T: u8 = 0x20; // Memory operation (always reads set)
const FLAG_N: u8 = 0x80; // Negative

/// Stack page, inside work RAM.
const STACK_BASE: u16 = 0xC100;

const INTERRUPT_CYCLES: u32 = 8;

#[derive(Debug, Clone, Default)]
pub struct R65c02 {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub s: u8,
    pub p: u8,
    pub pc: u16,
}

impl R65c02 {
    pub fn new() -> Self {
        let mut cpu = Self::default();
        cpu.power();
        cpu
    }

    fn fetch8(&mut self, bus: &mut dyn CpuBus) -> u8 {
        let val = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, bus: &mut dyn CpuBus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        hi << 8 | lo
    }

    fn push(&mut self, bus: &mut dyn CpuBus, val: u8) {
        bus.write(STACK_BASE | self.s as u16, val);
        self.s = self.s.wrapping_sub(1);
    }

    fn pull(&mut self, bus: &mut dyn CpuBus) -> u8 {
        self.s = self.s.wrapping_add(1);
        bus.read(STACK_BASE | self.s as u16)
    }

    fn set_nz(&mut self, val: u8) {
        self.p &= !(FLAG_N | FLAG_Z);
        if val == 0 {
            self.p |= FLAG_Z;
        }
        self.p |= val & FLAG_N;
    }

    fn branch(&mut self, bus: &mut dyn CpuBus, taken: bool) -> u32 {
        let offset = self.fetch8(bus) as i8;
        if taken {
            self.pc = self.pc.wrapping_add(offset as u16);
            4
        } else {
            2
        }
    }

    fn compare(&mut self, reg: u8, val: u8) {
        let res = reg.wrapping_sub(val);
        self.set_nz(res);
        if reg >= val {
            self.p |= FLAG_C;
        } else {
            self.p &= !FLAG_C;
        }
    }
}

impl Serializable for R65c02 {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.a);
        s.integer(&mut self.x);
        s.integer(&mut self.y);
        s.integer(&mut self.s);
        s.integer(&mut self.p);
        s.integer(&mut self.pc);
    }
}

impl Core for R65c02 {
    fn power(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.s = 0xFF;
        self.p = FLAG_I | FLAG_T;
        self.pc = 0;
    }

    fn pc(&self) -> u16 {
        self.pc
    }

    fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    fn interrupts_masked(&self) -> bool {
        self.p & FLAG_I != 0
    }

    fn instruction(&mut self, bus: &mut dyn CpuBus) -> u32 {
        let opcode = self.fetch8(bus);
        match opcode {
            0xEA => 2,
            0x78 => {
                self.p |= FLAG_I;
                2
            }
            0x58 => {
                self.p &= !FLAG_I;
                2
            }
            0x18 => {
                self.p &= !FLAG_C;
                2
            }
            0x38 => {
                self.p |= FLAG_C;
                2
            }
            0xA9 => {
                self.a = self.fetch8(bus);
                self.set_nz(self.a);
                2
            }
            0xAD => {
                let addr = self.fetch16(bus);
                self.a = bus.read(addr);
                self.set_nz(self.a);
                5
            }
            0xA2 => {
                self.x = self.fetch8(bus);
                self.set_nz(self.x);
                2
            }
            0xAE => {
                let addr = self.fetch16(bus);
                self.x = bus.read(addr);
                self.set_nz(self.x);
                5
            }
            0xBD => {
                let addr = self.fetch16(bus).wrapping_add(self.x as u16);
                self.a = bus.read(addr);
                self.set_nz(self.a);
                5
            }
            0x8D => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.a);
                5
            }
            0x9D => {
                let addr = self.fetch16(bus).wrapping_add(self.x as u16);
                bus.write(addr, self.a);
                5
            }
            0x8E => {
                let addr = self.fetch16(bus);
                bus.write(addr, self.x);
                5
            }
            0x9C => {
                let addr = self.fetch16(bus);
                bus.write(addr, 0);
                5
            }
            0xAA => {
                self.x = self.a;
                self.set_nz(self.x);
                2
            }
            0x8A => {
                self.a = self.x;
                self.set_nz(self.a);
                2
            }
            0xE8 => {
                self.x = self.x.wrapping_add(1);
                self.set_nz(self.x);
                2
            }
            0xCA => {
                self.x = self.x.wrapping_sub(1);
                self.set_nz(self.x);
                2
            }
            0x1A => {
                self.a = self.a.wrapping_add(1);
                self.set_nz(self.a);
                2
            }
            0x3A => {
                self.a = self.a.wrapping_sub(1);
                self.set_nz(self.a);
                2
            }
            0xEE => {
                let addr = self.fetch16(bus);
                let val = bus.read(addr).wrapping_add(1);
                bus.write(addr, val);
                self.set_nz(val);
                7
            }
            0xC9 => {
                let val = self.fetch8(bus);
                self.compare(self.a, val);
                2
            }
            0xE0 => {
                let val = self.fetch8(bus);
                self.compare(self.x, val);
                2
            }
            0x80 => self.branch(bus, true),
            0xF0 => self.branch(bus, self.p & FLAG_Z != 0),
            0xD0 => self.branch(bus, self.p & FLAG_Z == 0),
            0x4C => {
                self.pc = self.fetch16(bus);
                4
            }
            0x20 => {
                let target = self.fetch16(bus);
                let ret = self.pc.wrapping_sub(1);
                self.push(bus, (ret >> 8) as u8);
                self.push(bus, ret as u8);
                self.pc = target;
                7
            }
            0x60 => {
                let lo = self.pull(bus) as u16;
                let hi = self.pull(bus) as u16;
                self.pc = (hi << 8 | lo).wrapping_add(1);
                7
            }
            0x48 => {
                self.push(bus, self.a);
                3
            }
            0x68 => {
                self.a = self.pull(bus);
                self.set_nz(self.a);
                4
            }
            0x40 => {
                self.p = self.pull(bus) | FLAG_T;
                let lo = self.pull(bus) as u16;
                let hi = self.pull(bus) as u16;
                self.pc = hi << 8 | lo;
                7
            }
            _ => {
                trace!(
                    "unimplemented opcode {opcode:02X} at {:04X}",
                    self.pc.wrapping_sub(1)
                );
                2
            }
        }
    }

    fn interrupt(&mut self, bus: &mut dyn CpuBus, vector: u16) -> u32 {
        self.push(bus, (self.pc >> 8) as u8);
        self.push(bus, self.pc as u8);
        self.push(bus, (self.p | FLAG_T) & !FLAG_B);
        self.p = (self.p | FLAG_I) & !FLAG_D;
        let lo = bus.read(vector) as u16;
        let hi = bus.read(vector.wrapping_add(1)) as u16;
        self.pc = hi << 8 | lo;
        INTERRUPT_CYCLES
    }

    fn disassemble(&self, bus: &dyn CpuBus) -> String {
        let op = bus.peek(self.pc);
        let b1 = bus.peek(self.pc.wrapping_add(1));
        let b2 = bus.peek(self.pc.wrapping_add(2));
        let abs = (b2 as u16) << 8 | b1 as u16;
        let rel = self.pc.wrapping_add(2).wrapping_add(b1 as i8 as u16);
        match op {
            0xEA => "nop".to_string(),
            0x78 => "sei".to_string(),
            0x58 => "cli".to_string(),
            0x18 => "clc".to_string(),
            0x38 => "sec".to_string(),
            0xA9 => format!("lda #${b1:02x}"),
            0xAD => format!("lda ${abs:04x}"),
            0xBD => format!("lda ${abs:04x},x"),
            0xA2 => format!("ldx #${b1:02x}"),
            0xAE => format!("ldx ${abs:04x}"),
            0x8D => format!("sta ${abs:04x}"),
            0x9D => format!("sta ${abs:04x},x"),
            0x8E => format!("stx ${abs:04x}"),
            0x9C => format!("stz ${abs:04x}"),
            0xAA => "tax".to_string(),
            0x8A => "txa".to_string(),
            0xE8 => "inx".to_string(),
            0xCA => "dex".to_string(),
            0x1A => "inc".to_string(),
            0x3A => "dec".to_string(),
            0xEE => format!("inc ${abs:04x}"),
            0xC9 => format!("cmp #${b1:02x}"),
            0xE0 => format!("cpx #${b1:02x}"),
            0x80 => format!("bra ${rel:04x}"),
            0xF0 => format!("beq ${rel:04x}"),
            0xD0 => format!("bne ${rel:04x}"),
            0x4C => format!("jmp ${abs:04x}"),
            0x20 => format!("jsr ${abs:04x}"),
            0x60 => "rts".to_string(),
            0x48 => "pha".to_string(),
            0x68 => "pla".to_string(),
            0x40 => "rti".to_string(),
            _ => format!("db ${op:02x}"),
        }
    }

    fn context(&self) -> String {
        format!(
            "A:{:02x} X:{:02x} Y:{:02x} S:{:02x} P:{:02x}",
            self.a, self.x, self.y, self.s, self.p
        )
    }
}
