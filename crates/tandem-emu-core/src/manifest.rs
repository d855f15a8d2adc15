//! Cartridge manifest: the board description read at load time.
//!
//! ```toml
//! [game]
//! label = "Example"
//!
//! [game.board]
//! id = "MBC5"
//! rumble = true
//!
//! [[game.board.memory]]
//! type = "ROM"
//! content = "Program"
//! size = 0x100000
//! name = "program.rom"
//!
//! [[game.board.memory]]
//! type = "RAM"
//! content = "Save"
//! size = 0x8000
//! name = "save.ram"
//! nonVolatile = true
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

pub const MANIFEST_NAME: &str = "manifest.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MemoryKind {
    Rom,
    Ram,
    Rtc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRegion {
    #[serde(rename = "type")]
    pub kind: MemoryKind,
    pub content: String,
    pub size: usize,
    /// Backing file name under the cartridge's storage path.
    pub name: String,
    #[serde(default, rename = "nonVolatile")]
    pub non_volatile: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardSection {
    pub id: String,
    #[serde(default)]
    pub accelerometer: bool,
    #[serde(default)]
    pub rumble: bool,
    #[serde(default, rename = "memory")]
    pub memories: Vec<MemoryRegion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    #[serde(default)]
    pub label: String,
    pub board: BoardSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub game: Game,
}

impl Manifest {
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn board(&self) -> &BoardSection {
        &self.game.board
    }

    /// First region with the given type and content tag.
    pub fn memory(&self, kind: MemoryKind, content: &str) -> Option<&MemoryRegion> {
        self.game
            .board
            .memories
            .iter()
            .find(|m| m.kind == kind && m.content == content)
    }
}
