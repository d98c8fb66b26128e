//! Monitor enumeration

use crate::Rect;

/// One display, in desktop coordinates.
///
/// `index` is the position in enumeration order and is what capture sources
/// are created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    pub index: usize,
    pub rect: Rect,
    pub is_primary: bool,
    pub handle: isize,
}

impl MonitorInfo {
    pub fn new(index: usize, rect: Rect, is_primary: bool) -> Self {
        Self {
            index,
            rect,
            is_primary,
            handle: 0,
        }
    }
}

/// All attached monitors in system enumeration order.
#[cfg(windows)]
pub fn enumerate_monitors() -> Vec<MonitorInfo> {
    use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO, MONITORINFOF_PRIMARY,
    };

    unsafe extern "system" fn enum_proc(
        monitor: HMONITOR,
        _hdc: HDC,
        _rect: *mut RECT,
        data: LPARAM,
    ) -> BOOL {
        let monitors = &mut *(data.0 as *mut Vec<MonitorInfo>);
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        if GetMonitorInfoW(monitor, &mut info).as_bool() {
            let rc = info.rcMonitor;
            monitors.push(MonitorInfo {
                index: monitors.len(),
                rect: Rect::from_edges(rc.left, rc.top, rc.right, rc.bottom),
                is_primary: info.dwFlags & MONITORINFOF_PRIMARY != 0,
                handle: monitor.0 as isize,
            });
        }
        BOOL(1)
    }

    let mut monitors: Vec<MonitorInfo> = Vec::new();
    unsafe {
        let _ = EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(enum_proc),
            LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
        );
    }
    monitors
}
