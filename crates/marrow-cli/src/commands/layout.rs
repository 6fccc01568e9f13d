use marrow_layout::LayoutBuilder;
use marrow_types::{find_type, TypeDescriptor};

use crate::error::CliError;

/// One `name:type[:count]` field argument.
#[derive(Debug)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeDescriptor,
    pub count: Option<usize>,
}

pub fn parse_field_spec(spec: &str) -> Result<FieldSpec, CliError> {
    let mut parts = spec.split(':');
    let (name, type_name) = match (parts.next(), parts.next()) {
        (Some(name), Some(type_name)) if !name.is_empty() && !type_name.is_empty() => (name, type_name),
        _ => return Err(CliError::FieldSpec { spec: spec.to_string() }),
    };
    let count = match parts.next() {
        Some(count) => Some(
            count
                .parse::<usize>()
                .map_err(|source| CliError::FieldCount { spec: spec.to_string(), source })?,
        ),
        None => None,
    };
    if parts.next().is_some() {
        return Err(CliError::FieldSpec { spec: spec.to_string() });
    }
    Ok(FieldSpec { name: name.to_string(), ty: find_type(type_name)?, count })
}

pub fn handle_layout(name: &str, specs: &[String]) -> Result<(), CliError> {
    let mut builder = LayoutBuilder::new(name)?;
    for spec in specs {
        let field = parse_field_spec(spec)?;
        builder = match field.count {
            Some(count) => builder.array(field.name, field.ty, count),
            None => builder.field(field.name, field.ty),
        };
    }
    let layout = builder.build()?;
    let native = layout.native_struct()?;

    println!("struct {} (size {}, align {})", layout.name(), layout.size(), layout.alignment());
    for field in layout.fields() {
        println!("  {:>4}  {:<16} {} bytes", field.offset(), field.name(), field.size());
    }
    if native.size != layout.size() || native.alignment != layout.alignment() {
        log::warn!(
            "libffi reports size {} align {} for {}",
            native.size,
            native.alignment,
            layout.name()
        );
    }
    Ok(())
}
