// SPDX-License-Identifier: GPL-3.0-only

//! Hex-dump the entries of a serialized variable-list region.

use std::{env, fs, process};

use confdata::varlist;

fn main() {
    let path = match env::args().nth(1) {
        Some(some) => some,
        None => {
            eprintln!("dump [file]");
            process::exit(1);
        }
    };

    let data = fs::read(path).expect("failed to read file");

    if let Ok(entries) = varlist::deserialize(&data) {
        for entry in &entries {
            println!(
                "\x1B[1m{} {} ({:#010x}): {}\x1B[0m",
                entry.guid,
                entry.name,
                entry.attributes.bits(),
                entry.data.len()
            );

            for row in 0..(entry.data.len() + 15) / 16 {
                print!("{:04X}:", row * 16);
                for col in 0..16 {
                    let j = row * 16 + col;
                    if j < entry.data.len() {
                        print!(" {:02X}", entry.data[j]);
                    }
                }
                println!();
            }
        }
    }

    println!();

    let used = varlist::used_size(&data);
    let percent = (used * 100) / data.len().max(1);
    println!(
        "\x1B[1mVariable list used space:\x1B[0m {} / {} bytes ({}%)",
        used,
        data.len(),
        percent
    );

    if varlist::is_corrupted(&data) {
        println!("\x1B[1m\x1B[91mVariable list region is corrupted\x1B[39m\x1B[0m");
    }
}
