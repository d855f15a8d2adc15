use crate::bus::Io;
use crate::state::{Serializable, Serializer};

/// Clock rate of the video domain.
pub const FREQUENCY: u32 = 21_477_270;

pub const CLOCKS_PER_LINE: u16 = 1365;
pub const LINES_PER_FRAME: u16 = 263;

/// Clocks consumed by one call to [`Video::main`].
pub const CLOCKS_PER_STEP: u16 = 4;

const CONTROL_RASTER_IRQ: u8 = 0x01;
const STATUS_RASTER: u8 = 0x80;

/// Beam position counters with a raster-compare interrupt on IRQ1.
///
/// Ports relative to the block base:
/// - `+0` vertical counter, low byte
/// - `+1` vertical counter bit 8
/// - `+2` raster compare
/// - `+3` control (write), status (read; acknowledges the raster IRQ)
#[derive(Debug, Clone, Default)]
pub struct Video {
    pub vcounter: u16,
    pub hcounter: u16,
    pub compare: u8,
    pub control: u8,
    pub frames: u64,
    irq: bool,
}

impl Video {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(&mut self) {
        *self = Self::default();
    }

    pub fn irq_line(&self) -> bool {
        self.irq
    }

    /// Advance the beam by one step and return the clocks it took.
    pub fn main(&mut self) -> u32 {
        self.hcounter += CLOCKS_PER_STEP;
        if self.hcounter >= CLOCKS_PER_LINE {
            self.hcounter -= CLOCKS_PER_LINE;
            self.vcounter += 1;
            if self.vcounter == LINES_PER_FRAME {
                self.vcounter = 0;
                self.frames += 1;
            }
            if self.control & CONTROL_RASTER_IRQ != 0 && self.vcounter == self.compare as u16 {
                self.irq = true;
            }
        }
        CLOCKS_PER_STEP as u32
    }

    pub fn counters(&self) -> [String; 2] {
        [
            format!("V:{:03}", self.vcounter),
            format!("H:{:04}", self.hcounter),
        ]
    }

    fn status(&self) -> u8 {
        if self.irq { STATUS_RASTER } else { 0 }
    }
}

impl Io for Video {
    fn peek(&self, address: u32) -> u8 {
        match address & 0x03 {
            0 => self.vcounter as u8,
            1 => (self.vcounter >> 8) as u8,
            2 => self.compare,
            _ => self.status(),
        }
    }

    fn read(&mut self, address: u32) -> u8 {
        let value = self.peek(address);
        if address & 0x03 == 3 {
            self.irq = false;
        }
        value
    }

    fn write(&mut self, address: u32, value: u8) {
        match address & 0x03 {
            2 => self.compare = value,
            3 => {
                self.control = value;
                if value & CONTROL_RASTER_IRQ == 0 {
                    self.irq = false;
                }
            }
            _ => {}
        }
    }
}

impl Serializable for Video {
    fn serialize(&mut self, s: &mut Serializer) {
        s.integer(&mut self.vcounter);
        s.integer(&mut self.hcounter);
        s.integer(&mut self.compare);
        s.integer(&mut self.control);
        s.integer(&mut self.frames);
        s.boolean(&mut self.irq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_lines(video: &mut Video, lines: u32) {
        let steps = lines * CLOCKS_PER_LINE as u32 / CLOCKS_PER_STEP as u32 + 1;
        for _ in 0..steps {
            video.main();
        }
    }

    #[test]
    fn raster_compare_raises_and_status_read_acknowledges() {
        let mut v = Video::new();
        v.write(2, 3);
        v.write(3, CONTROL_RASTER_IRQ);
        run_lines(&mut v, 2);
        assert!(!v.irq_line());
        run_lines(&mut v, 1);
        assert!(v.irq_line());
        assert_eq!(v.peek(3), STATUS_RASTER);
        assert!(v.irq_line());
        assert_eq!(v.read(3), STATUS_RASTER);
        assert!(!v.irq_line());
    }

    #[test]
    fn frame_wraps_after_last_line() {
        let mut v = Video::new();
        run_lines(&mut v, LINES_PER_FRAME as u32);
        assert_eq!(v.frames, 1);
        assert!(v.vcounter < 2);
        assert!(!v.irq_line());
    }
}
