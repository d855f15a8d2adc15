mod common;

use std::fs;

use common::{Board, PATH, RAM_NAME, ROM_NAME, RTC_NAME, banked_rom};
use tandem_emu_core::cartridge::{Cartridge, MAX_REGION_SIZE, MIN_ROM_SIZE, SENTINEL};
use tandem_emu_core::error::{LoadError, SaveError};
use tandem_emu_core::platform::{DirectoryPlatform, FileMode, Platform, Requirement};
use tempfile::tempdir;

#[test]
fn fresh_non_volatile_ram_is_sentinel_filled_and_saved_whole() {
    let board = Board::new("MBC1", 0x8000).ram(0x2000, true);
    let mut platform = board.platform(vec![0; 0x8000]);

    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(cart.memory.ram.size(), 8192);
    assert!(cart.memory.ram.as_slice().iter().all(|&b| b == SENTINEL));

    cart.power();
    cart.save(&mut platform, PATH).unwrap();
    let saved = platform.get(PATH, RAM_NAME).unwrap();
    assert_eq!(saved.len(), 8192);
    assert!(saved.iter().all(|&b| b == SENTINEL));
}

#[test]
fn battery_ram_survives_save_and_reload_on_disk() {
    let dir = tempdir().unwrap();
    let board = Board::new("MBC5", 0x8000).ram(0x8000, true);
    fs::write(dir.path().join("manifest.toml"), board.manifest()).unwrap();
    fs::write(dir.path().join(ROM_NAME), vec![0u8; 0x8000]).unwrap();

    let mut platform = DirectoryPlatform::new();
    let path = platform.register(dir.path());

    let mut cart = Cartridge::load(&mut platform, path).unwrap();
    cart.power();
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x02);
    cart.write(0xA123, 0x5A);
    cart.save(&mut platform, path).unwrap();

    let on_disk = fs::read(dir.path().join(RAM_NAME)).unwrap();
    assert_eq!(on_disk.len(), 0x8000);
    assert_eq!(on_disk[2 * 0x2000 + 0x123], 0x5A);

    let mut cart = Cartridge::load(&mut platform, path).unwrap();
    cart.power();
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x02);
    assert_eq!(cart.read(0xA123), 0x5A);
}

#[test]
fn volatile_ram_is_never_persisted() {
    let board = Board::new("MBC1", 0x8000).ram(0x2000, false);
    let mut platform = board.platform(vec![0; 0x8000]);

    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    cart.power();
    cart.write(0x0000, 0x0A);
    cart.write(0xA000, 0x12);
    cart.save(&mut platform, PATH).unwrap();
    assert!(!platform.contains(PATH, RAM_NAME));

    // A stale file from elsewhere is ignored as well.
    platform.insert(PATH, RAM_NAME, vec![0x34; 0x2000]);
    let cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(cart.memory.ram.read(0), SENTINEL);
}

#[test]
fn short_backing_file_only_overlays_its_length() {
    let board = Board::new("MBC1", 0x8000).ram(0x2000, true);
    let mut platform = board.platform(vec![0; 0x8000]);
    platform.insert(PATH, RAM_NAME, vec![1, 2, 3, 4]);

    let cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(&cart.memory.ram.as_slice()[..5], &[1, 2, 3, 4, SENTINEL]);

    platform.insert(PATH, RAM_NAME, vec![7; 0x4000]);
    let cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(cart.memory.ram.size(), 0x2000);
}

#[test]
fn small_rom_is_padded_to_one_bank() {
    let board = Board::new("MBC0", 0x100);
    let mut platform = board.platform(vec![0x11; 0x100]);
    let cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(cart.memory.rom.size(), MIN_ROM_SIZE);
    assert_eq!(cart.read(0x00FF), 0x11);
    assert_eq!(cart.read(0x0100), SENTINEL);
}

#[test]
fn unrecognized_board_is_a_configuration_error() {
    let board = Board::new("MBC4", 0x8000);
    let mut platform = board.platform(vec![0; 0x8000]);
    let err = Cartridge::load(&mut platform, PATH).unwrap_err();
    assert!(matches!(err, LoadError::Configuration(_)), "{err}");
}

#[test]
fn missing_rom_or_manifest_fails_load() {
    let board = Board::new("MBC1", 0x8000);
    let mut platform = board.platform(vec![0; 0x8000]);
    platform.remove(PATH, ROM_NAME);
    match Cartridge::load(&mut platform, PATH) {
        Err(LoadError::RequiredResourceMissing { name }) => assert_eq!(name, ROM_NAME),
        other => panic!("unexpected result {other:?}"),
    }

    platform.remove(PATH, "manifest.toml");
    assert!(matches!(
        Cartridge::load(&mut platform, PATH),
        Err(LoadError::RequiredResourceMissing { .. })
    ));
}

#[test]
fn mbc7_requires_the_accelerometer() {
    let board = Board::new("MBC7", 0x8000).ram(256, true);
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(matches!(
        Cartridge::load(&mut platform, PATH),
        Err(LoadError::Configuration(_))
    ));

    let board = Board::new("MBC7", 0x8000).ram(256, true).accelerometer();
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(Cartridge::load(&mut platform, PATH).is_ok());
}

#[test]
fn rom_banks_past_the_end_wrap_for_every_board() {
    // Two banks of ROM, bank 3 selected: offset 3 * 0x4000 wraps to bank 1.
    let selects: &[(&str, &[(u16, u8)])] = &[
        ("MBC1", &[(0x2000, 3)]),
        ("MBC1M", &[(0x2000, 3)]),
        ("MBC2", &[(0x2100, 3)]),
        ("MBC3", &[(0x2000, 3)]),
        ("MBC5", &[(0x2000, 3)]),
        // 8 KiB banks.
        ("MBC6", &[(0x2000, 6)]),
        ("MBC7", &[(0x2000, 3)]),
        ("MMM01", &[(0x0000, 0x40), (0x2000, 3)]),
        ("HuC1", &[(0x2000, 3)]),
        ("HuC3", &[(0x2000, 3)]),
        ("TAMA", &[(0xA001, 0), (0xA000, 3)]),
    ];
    for &(id, writes) in selects {
        let mut board = Board::new(id, 0x8000);
        if id == "MBC7" {
            board = board.accelerometer();
        }
        let mut platform = board.platform(banked_rom(0x8000));
        let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
        cart.power();

        for &(address, value) in writes {
            cart.write(address, value);
        }
        assert_eq!(cart.read(0x4000), 1, "{id}");
        assert_eq!(cart.read(0x4001), 0xA5 ^ 1, "{id}");
        assert_eq!(cart.read(0x0000), 0, "{id}");
    }

    let mut platform = Board::new("MBC0", 0x4000).platform(banked_rom(0x4000));
    let cart = Cartridge::load(&mut platform, PATH).unwrap();
    assert_eq!(cart.read(0x4001), cart.read(0x0001));
}

#[test]
fn ram_offsets_past_the_end_wrap_for_every_board() {
    for id in ["MBC0", "MBC1", "MBC1M", "MBC3", "MBC5", "MBC6", "MMM01", "HuC1", "HuC3"] {
        let board = Board::new(id, 0x8000).ram(0x800, true);
        let mut platform = board.platform(vec![0; 0x8000]);
        let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
        cart.power();
        cart.write(0x0000, 0x0A);

        cart.write(0xA005, 0x77);
        assert_eq!(cart.read(0xA805), 0x77, "{id}");
        assert_eq!(cart.read(0xB005), 0x77, "{id}");
        assert_eq!(cart.memory.ram.read(0x805), 0x77, "{id}");
    }
}

#[test]
fn empty_regions_read_open_bus() {
    for id in ["MBC0", "MBC1", "MBC3", "MBC5"] {
        let mut platform = Board::new(id, 0x8000).platform(vec![0; 0x8000]);
        let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
        cart.power();
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x12);
        assert_eq!(cart.read(0xA000), 0xFF, "{id}");
    }
}

#[test]
fn mbc3_rtc_state_roundtrips_through_save() {
    let board = Board::new("MBC3", 0x8000).ram(0x2000, true).rtc(32);
    let mut platform = board.platform(vec![0; 0x8000]);

    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    cart.power();
    cart.write(0x0000, 0x0A);
    cart.write(0x4000, 0x08);
    cart.write(0xA000, 12);
    cart.write(0x4000, 0x09);
    cart.write(0xA000, 34);
    for _ in 0..3 {
        cart.second();
    }
    cart.write(0x4000, 0x0C);
    cart.write(0xA000, 0x40); // halt
    cart.save(&mut platform, PATH).unwrap();
    assert_eq!(platform.get(PATH, RTC_NAME).unwrap().len(), 32);

    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    cart.power();
    cart.second();
    cart.write(0x0000, 0x0A);
    cart.write(0x6000, 0x00);
    cart.write(0x6000, 0x01);

    cart.write(0x4000, 0x08);
    assert_eq!(cart.read(0xA000), 15);
    cart.write(0x4000, 0x09);
    assert_eq!(cart.read(0xA000), 34);
    cart.write(0x4000, 0x0C);
    assert_eq!(cart.read(0xA000) & 0x40, 0x40);
}

#[test]
fn undersized_rtc_region_is_a_configuration_error() {
    for id in ["MBC3", "HuC3", "TAMA"] {
        let board = Board::new(id, 0x8000).rtc(4);
        let mut platform = board.platform(vec![0; 0x8000]);
        let err = Cartridge::load(&mut platform, PATH).unwrap_err();
        assert!(matches!(err, LoadError::Configuration(_)), "{id}: {err}");
    }

    let board = Board::new("MBC3", 0x8000).rtc(13);
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(matches!(
        Cartridge::load(&mut platform, PATH),
        Err(LoadError::Configuration(_))
    ));
}

#[test]
fn oversized_regions_are_rejected_before_allocation() {
    let board = Board::new("MBC5", 0x7FFF_FFFF_FFFF);
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(matches!(
        Cartridge::load(&mut platform, PATH),
        Err(LoadError::Configuration(_))
    ));

    let board = Board::new("MBC5", 0x8000).ram(MAX_REGION_SIZE + 1, false);
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(matches!(
        Cartridge::load(&mut platform, PATH),
        Err(LoadError::Configuration(_))
    ));

    let board = Board::new("MBC5", MAX_REGION_SIZE);
    let mut platform = board.platform(vec![0; 0x8000]);
    assert!(Cartridge::load(&mut platform, PATH).is_ok());
}

#[test]
fn infrared_led_follows_the_ir_port() {
    for id in ["HuC1", "HuC3"] {
        let mut platform = Board::new(id, 0x8000).ram(0x2000, false).platform(vec![0; 0x8000]);
        let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
        cart.power();
        assert!(!cart.ir_led(), "{id}");
        cart.write(0x0000, 0x0E);
        cart.write(0xA000, 0x01);
        assert!(cart.ir_led(), "{id}");
        cart.write(0xA000, 0x00);
        assert!(!cart.ir_led(), "{id}");
    }

    let mut platform = Board::new("MBC5", 0x8000).platform(vec![0; 0x8000]);
    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    cart.power();
    cart.write(0x0000, 0x0E);
    cart.write(0xA000, 0x01);
    assert!(!cart.ir_led());
}

#[test]
fn boot_overlay_disables_exactly_once() {
    let mut platform = Board::new("MBC0", 0x8000).platform(vec![0x22; 0x8000]);
    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    cart.power();
    assert!(!cart.bootstrap_enabled());
    assert_eq!(cart.read(0x0000), 0x22);

    cart.attach_boot_rom(vec![0x99; 0x100]);
    cart.power();
    assert!(cart.bootstrap_enabled());
    assert_eq!(cart.read(0x0000), 0x99);
    assert_eq!(cart.read(0x0100), 0x22);
    assert_eq!(cart.read(0xFF50), 0xFF);

    cart.write(0xFF50, 0x01);
    assert!(!cart.bootstrap_enabled());
    assert_eq!(cart.read(0x0000), 0x22);
    cart.write(0xFF50, 0x00);
    assert_eq!(cart.read(0x0000), 0x22);
}

#[test]
fn unwritable_save_target_is_reported() {
    struct ReadOnly(tandem_emu_core::platform::MemoryPlatform);

    impl Platform for ReadOnly {
        fn open(
            &mut self,
            path: u32,
            name: &str,
            mode: FileMode,
            requirement: Requirement,
        ) -> Option<Box<dyn tandem_emu_core::platform::VirtualFile>> {
            match mode {
                FileMode::Read => self.0.open(path, name, mode, requirement),
                FileMode::Write => None,
            }
        }
    }

    let board = Board::new("MBC1", 0x8000).ram(0x2000, true);
    let mut platform = ReadOnly(board.platform(vec![0; 0x8000]));
    let mut cart = Cartridge::load(&mut platform, PATH).unwrap();
    match cart.save(&mut platform, PATH) {
        Err(SaveError::Unavailable { name }) => assert_eq!(name, RAM_NAME),
        other => panic!("unexpected result {other:?}"),
    }
}
