use std::path::Path;

use marrow_call::{CallDescriptorBuilder, CallOptions};
use marrow_types::TypeArg;

use crate::error::CliError;

pub fn handle_cif(ret: &str, args: &[String], options: Option<&Path>) -> Result<(), CliError> {
    let options = options.map(CallOptions::load).transpose()?;
    let mut builder = CallDescriptorBuilder::new();
    let args = args.iter().map(|name| TypeArg::from(name.as_str())).collect();
    builder.initialize(ret, args, options)?;
    let descriptor = builder.build()?;

    println!("{}", descriptor.signature());
    for (index, (ty, offset)) in descriptor
        .argument_types()
        .iter()
        .zip(descriptor.argument_offsets())
        .enumerate()
    {
        println!("  arg {index}: {:<10} at {offset}", ty.name());
    }
    println!("  result:  {:<10} at {}", descriptor.return_type().name(), descriptor.result_offset());
    println!("  exchange buffer: {} bytes", descriptor.exchange_size());
    if let Some(options) = descriptor.options() {
        println!("  convention: {:?}, blocking: {}", options.convention, options.blocking);
    }
    Ok(())
}
