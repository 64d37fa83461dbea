use super::util::Result;

pub fn readable_size(bytes: usize) -> (f64, &'static str) {
    const UNITS: [(f64, &str); 5] = [
        (1.0, "B"),
        (1024.0, "KiB"),
        (1024.0 * 1024.0, "MiB"),
        (1024.0 * 1024.0 * 1024.0, "GiB"),
        (1024.0 * 1024.0 * 1024.0 * 1024.0, "TiB"),
    ];

    let value = bytes as f64;
    let unit = UNITS
        .iter()
        .rev()
        .find(|(scale, _)| value >= *scale)
        .copied()
        .unwrap_or(UNITS[0]);

    (value / unit.0, unit.1)
}

#[cfg(target_os = "macos")]
pub fn peak_memory_usage() -> Result<usize> {
    unsafe {
        let mut rusage: libc::rusage = std::mem::zeroed();
        let retval = libc::getrusage(libc::RUSAGE_SELF, &mut rusage as *mut _);
        match retval {
            0 => Ok(rusage.ru_maxrss as usize),
            _ => Err(crate::mnvx_error!("libc::getrusage call failed")),
        }
    }
}

/// Peak resident set size from `/proc/self/status` (VmHWM), in bytes.
#[cfg(target_os = "linux")]
pub fn peak_memory_usage() -> Result<usize> {
    let status = std::fs::read_to_string("/proc/self/status")?;
    let kib = status
        .lines()
        .find_map(|line| line.strip_prefix("VmHWM:"))
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or_else(|| crate::mnvx_error!("VmHWM missing from /proc/self/status"))?
        .parse::<usize>()?;
    Ok(kib * 1024)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn peak_memory_usage() -> Result<usize> {
    Err(crate::mnvx_error!(
        "No peak_memory_usage implementation for this OS"
    ))
}
