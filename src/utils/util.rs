use crate::error::MnvxResult;
use log;
use std::{
    fmt::{Binary, Display},
    path::Path,
    sync::Once,
};

pub type Result<T> = MnvxResult<T>;

pub const MISSING_INTEGER: i32 = i32::MIN;
pub const VECTOR_END_INTEGER: i32 = i32::MIN + 1;
pub const MISSING_FLOAT: f32 = f32::from_bits(0x7F80_0001);
pub const VECTOR_END_FLOAT: f32 = f32::from_bits(0x7F80_0002);

#[allow(unused)]
static INIT_LOG: Once = Once::new();

#[allow(unused)]
pub fn init_logger() {
    INIT_LOG.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Trace)
            .is_test(true)
            .init();
    });
}

pub fn handle_error_and_exit(err: impl Display) -> ! {
    log::error!("{err}");
    std::process::exit(1);
}

pub fn is_missing_float(value: f32) -> bool {
    value.to_bits() == MISSING_FLOAT.to_bits() || value.to_bits() == VECTOR_END_FLOAT.to_bits()
}

pub fn is_missing_integer(value: i32) -> bool {
    value == MISSING_INTEGER || value == VECTOR_END_INTEGER
}

/// Base name of a path, falling back to the full path when it has none.
pub fn file_name_or_path(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn format_number_with_commas<T>(n: T) -> String
where
    T: Display + Binary,
{
    let s = n.to_string();
    let (sign, digits) = s.strip_prefix('-').map_or(("", s.as_str()), |d| ("-", d));

    if let 0..=3 = digits.len() {
        return s;
    }

    let mut result = String::with_capacity(digits.len() + (digits.len() - 1) / 3 + sign.len());
    for (digit_count, c) in digits.chars().rev().enumerate() {
        if digit_count > 0 && digit_count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result = result.chars().rev().collect();
    if !sign.is_empty() {
        result.insert_str(0, sign);
    }

    result
}
