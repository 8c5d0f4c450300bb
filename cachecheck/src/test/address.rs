use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::address::{render_table, AddressFields, Geometry};

use super::geometry;

#[test]
fn splits_offset_index_and_tag() {
    let fields = AddressFields::decompose(0b1011_0110_1101, geometry(4, 1, 3));
    assert_eq!(fields.offset, 0b101);
    assert_eq!(fields.index, 0b1101);
    assert_eq!(fields.tag, 0b10110);
    assert_eq!(fields.to_binary(), ["0".repeat(52) + "10110", "1101".to_string(), "101".to_string()]);
    assert_eq!(fields.to_hex(), ["0x16", "0xd", "0x5"].map(String::from));
}

#[test]
fn reassembles_any_address() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for s in 0..=64u32 {
        for b in 0..=(64 - s) {
            let g = geometry(s, 1, b);
            for address in [0, 1, u64::MAX, 1 << 63, rng.gen::<u64>(), rng.gen::<u64>()] {
                let fields = AddressFields::decompose(address, g);
                assert_eq!(fields.reassemble(), address, "address {address:#x} with {g}");
                let widths = fields.to_binary().map(|f| f.len() as u32);
                assert_eq!(widths, [g.tag_bits(), s, b]);
            }
        }
    }
}

#[test]
fn zero_width_fields_render_empty() {
    let fields = AddressFields::decompose(0xdead_beef, geometry(0, 1, 0));
    assert_eq!(fields.tag, 0xdead_beef);
    assert_eq!(fields.to_binary()[1], "");
    assert_eq!(fields.to_binary()[2], "");
    assert_eq!(fields.to_hex()[1], "0x0");

    let fields = AddressFields::decompose(u64::MAX, geometry(60, 1, 4));
    assert_eq!(fields.tag, 0);
    assert_eq!(fields.to_binary()[0], "");
    assert_eq!(fields.index, (1 << 60) - 1);
}

#[test]
fn rejects_impossible_geometries() {
    assert!(Geometry::new(33, 1, 32).is_err());
    assert!(Geometry::new(2, 0, 2).is_err());
    assert!(Geometry::new(u32::MAX, 1, 1).is_err());
    assert_eq!(Geometry::new(32, 4, 32).map(|g| g.tag_bits()).ok(), Some(0));
}

#[test]
fn table_columns_line_up() {
    let table = AddressFields::decompose(0x7ff000384, geometry(4, 2, 4)).render_table();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 6);
    assert!(lines[0].starts_with('+') && lines[0].ends_with('+'));
    assert_eq!(lines[0], lines[2]);
    assert_eq!(lines[0], lines[5]);
    assert!(lines[1].starts_with("| tag"));
    assert!(lines[4].contains("0x7ff0003"));
    assert!(lines.iter().all(|l| l.len() == lines[0].len()));
}

#[test]
fn table_width_rounds_to_four() {
    let rows = [["a".to_string(), "index".to_string()]];
    assert_eq!(render_table(&rows), "+-----+---------+\n| a   | index   |\n+-----+---------+\n+-----+---------+");
}
