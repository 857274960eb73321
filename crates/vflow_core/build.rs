use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// OpenFlow 1.0 match fields in classification order: (name, wildcard shift, wildcard width).
const FIELDS: [(&str, u32, u32); 12] = [
    ("in_port", 0, 1),
    ("dl_dst", 3, 1),
    ("dl_src", 2, 1),
    ("dl_type", 4, 1),
    ("dl_vlan", 1, 1),
    ("dl_vlan_pcp", 20, 1),
    ("nw_proto", 5, 1),
    ("nw_tos", 21, 1),
    ("nw_dst", 14, 6),
    ("nw_src", 8, 6),
    ("tp_src", 6, 1),
    ("tp_dst", 7, 1),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    let path = Path::new(&env::var("OUT_DIR").unwrap()).join("codegen.rs");
    let mut file = BufWriter::new(File::create(&path).unwrap());
    let mut m: phf_codegen::OrderedMap<&'static str> = phf_codegen::OrderedMap::new();
    let mut all: u32 = 0;

    for (idx, &(name, shift, width)) in FIELDS.iter().enumerate() {
        m.entry(
            name,
            format!("({}usize, {}u32, {}u32)", idx, shift, width).as_str(),
        );
        let mask = ((1u32 << width) - 1) << shift;
        assert_eq!(all & mask, 0, "{} overlaps another wildcard", name);
        all |= mask;
    }

    write!(
        &mut file,
        "pub static FIELD_MAP: phf::OrderedMap<&'static str, (usize, u32, u32)> = {}",
        m.build()
    )
    .unwrap();
    writeln!(&mut file, ";\n").unwrap();
    writeln!(&mut file, "pub const FIELD_COUNT: usize = {}usize;\n", FIELDS.len()).unwrap();
    writeln!(&mut file, "pub const OFPFW_ALL: u32 = {:#x}u32;\n", all).unwrap();
}
