use marrow_memory::ACCESSOR_ALIASES;
use marrow_types::catalog;

use crate::error::CliError;

pub fn handle_types(accessors: bool) -> Result<(), CliError> {
    println!("{:<14} {:>5} {:>6}  {:<10} {:<9} aliases", "name", "size", "align", "abi", "strategy");
    for (descriptor, aliases) in catalog().iter() {
        let size = if descriptor.is_sized() { descriptor.size().to_string() } else { "-".to_string() };
        println!(
            "{:<14} {:>5} {:>6}  {:<10} {:<9} {}",
            descriptor.name(),
            size,
            descriptor.alignment(),
            format!("{:?}", descriptor.abi()),
            descriptor.strategy().family(),
            aliases.join(", ")
        );
    }

    if accessors {
        println!();
        println!("memory accessor names:");
        for (alias, canonical) in ACCESSOR_ALIASES {
            println!("  {alias:<12} -> {canonical}");
        }
    }
    Ok(())
}
