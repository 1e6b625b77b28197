mod common;

use common::{
    put_frame, settings_table, settings_with_brightness, MemFlash, Operation, AREA, PART_A, PART_B,
    PART_SIZE,
};
use pretty_assertions::assert_eq;
use rtx_settings::raw::STORE_SIZE;
use rtx_settings::{Settings, SettingsStorage};

#[test]
fn first_boot_returns_defaults_and_persists() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);

    {
        let mut nvm = settings_table(&mut flash);
        let loaded = storage.load(&mut nvm).unwrap();
        assert_eq!(loaded, Settings::default());

        // First boot leaves a rewrite pending: saving the unchanged
        // defaults must still hit the device.
        storage.save(&mut nvm, &loaded).unwrap();
    }

    // The first persisted frame carries counter 1, which lands in B.
    let writes: Vec<_> = flash
        .operations
        .iter()
        .filter(|op| matches!(op, Operation::Write { .. }))
        .collect();
    assert_eq!(
        writes,
        vec![&Operation::Write {
            address: PART_SIZE,
            len: STORE_SIZE,
        }]
    );

    // A new handle over the same flash sees the same settings.
    let mut reopened = SettingsStorage::new(AREA, PART_A, PART_B);
    let mut nvm = settings_table(&mut flash);
    assert_eq!(reopened.load(&mut nvm).unwrap(), Settings::default());
}

#[test]
fn save_is_idempotent() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);

    {
        let mut nvm = settings_table(&mut flash);
        let loaded = storage.load(&mut nvm).unwrap();
        storage.save(&mut nvm, &loaded).unwrap();
    }
    let writes_after_first = flash.writes();
    assert_eq!(writes_after_first, 1);

    {
        let mut nvm = settings_table(&mut flash);
        storage.save(&mut nvm, &Settings::default()).unwrap();
        storage.save(&mut nvm, &Settings::default()).unwrap();
    }

    // Unchanged settings with no rewrite pending never reach the device.
    assert_eq!(flash.writes(), writes_after_first);
}

#[test]
fn consecutive_saves_alternate_partitions() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);

    {
        let mut nvm = settings_table(&mut flash);
        storage.load(&mut nvm).unwrap();
        for i in 1..=8u8 {
            storage
                .save(&mut nvm, &settings_with_brightness(i))
                .unwrap();
        }
    }

    let writes: Vec<_> = flash
        .operations
        .iter()
        .filter_map(|op| match op {
            Operation::Write { address, .. } => Some(*address),
            _ => None,
        })
        .collect();

    // Counter parity steers odd saves to B and even saves to A, each
    // partition appending independently.
    let frame = STORE_SIZE as u32;
    assert_eq!(
        writes,
        vec![
            PART_SIZE,             // counter 1
            0,                     // counter 2
            PART_SIZE + frame,     // counter 3
            frame,                 // counter 4
            PART_SIZE + 2 * frame, // counter 5
            2 * frame,             // counter 6
            PART_SIZE + 3 * frame, // counter 7
            3 * frame,             // counter 8
        ]
    );
}

#[test]
fn load_picks_newer_counter() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    let older = settings_with_brightness(40);
    let newer = settings_with_brightness(50);
    put_frame(&mut flash.buf, 0, 4, &older);
    put_frame(&mut flash.buf, PART_SIZE as usize, 5, &newer);

    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);
    {
        let mut nvm = settings_table(&mut flash);
        assert_eq!(storage.load(&mut nvm).unwrap(), newer);

        // The next save advances to counter 6 and appends to A behind the
        // counter 4 frame.
        storage
            .save(&mut nvm, &settings_with_brightness(60))
            .unwrap();
    }

    let writes: Vec<_> = flash
        .operations
        .iter()
        .filter(|op| matches!(op, Operation::Write { .. }))
        .collect();
    assert_eq!(
        writes,
        vec![&Operation::Write {
            address: STORE_SIZE as u32,
            len: STORE_SIZE,
        }]
    );

    let mut reopened = SettingsStorage::new(AREA, PART_A, PART_B);
    let mut nvm = settings_table(&mut flash);
    assert_eq!(
        reopened.load(&mut nvm).unwrap(),
        settings_with_brightness(60)
    );
}

#[test]
fn counter_tie_prefers_partition_a() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    let in_a = settings_with_brightness(70);
    let in_b = settings_with_brightness(80);
    put_frame(&mut flash.buf, 0, 7, &in_a);
    put_frame(&mut flash.buf, PART_SIZE as usize, 7, &in_b);

    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);
    {
        let mut nvm = settings_table(&mut flash);
        assert_eq!(storage.load(&mut nvm).unwrap(), in_a);

        // Both partitions were readable, so nothing is pending.
        storage.save(&mut nvm, &in_a).unwrap();
    }
    assert_eq!(flash.writes(), 0);
}

#[test]
fn load_is_cached_after_first_scan() {
    let mut flash = MemFlash::new(common::DEVICE_SIZE);
    put_frame(&mut flash.buf, 0, 2, &settings_with_brightness(11));

    let mut storage = SettingsStorage::new(AREA, PART_A, PART_B);
    {
        let mut nvm = settings_table(&mut flash);
        storage.load(&mut nvm).unwrap();
    }
    let reads_after_first = flash.operations.len();

    {
        let mut nvm = settings_table(&mut flash);
        assert_eq!(
            storage.load(&mut nvm).unwrap(),
            settings_with_brightness(11)
        );
    }
    assert_eq!(flash.operations.len(), reads_after_first);
}
