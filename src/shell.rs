//! Desktop-side effects: closing and relaunching the Office applications and
//! opening destination folders in the file explorer. Off Windows every action
//! is logged and skipped, so the install flow stays runnable end to end.

use anyhow::Result;
use tracing::debug;
#[cfg(windows)]
use tracing::{info, warn};

use crate::classify::OfficeApp;
use crate::folders::FolderTarget;

/// The single argument handed to the file explorer for a folder target:
/// `/select,<file>` when the selected file is present on disk, otherwise the
/// bare directory. A selection recorded for a file that later disappeared
/// would make Explorer error out instead of opening the folder.
fn explorer_argument(target: &FolderTarget) -> std::ffi::OsString {
    match &target.file_to_select {
        Some(file) if file.exists() => format!("/select,{}", file.display()).into(),
        _ => target.directory.as_os_str().to_os_string(),
    }
}

#[cfg(windows)]
mod windows_impl {
    use anyhow::Result;
    use std::process::Command;
    use tracing::{debug, warn};
    use windows::Win32::Foundation::{CloseHandle, ERROR_NO_MORE_FILES, HANDLE};
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{OpenProcess, TerminateProcess, PROCESS_TERMINATE};

    use crate::classify::OfficeApp;

    /// RAII guard to ensure handle is closed.
    struct HandleGuard(HANDLE);

    impl Drop for HandleGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Terminate every running instance of the Office applications. Returns
    /// the executable names that had at least one instance terminated.
    pub fn close_office_apps() -> Result<Vec<String>> {
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)?;
            if snapshot.is_invalid() {
                return Err(anyhow::anyhow!("Failed to create process snapshot"));
            }
            let _guard = HandleGuard(snapshot);

            let mut entry = PROCESSENTRY32W {
                dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
                ..Default::default()
            };
            if Process32FirstW(snapshot, &mut entry).is_err() {
                return Err(anyhow::anyhow!("Failed to get first process"));
            }

            let mut closed = Vec::new();
            loop {
                let exe_len = entry
                    .szExeFile
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(entry.szExeFile.len());
                let exe_name = String::from_utf16_lossy(&entry.szExeFile[..exe_len]);
                let exe_lower = exe_name.to_lowercase();

                for app in OfficeApp::ALL {
                    if exe_lower == app.executable() {
                        match OpenProcess(PROCESS_TERMINATE, false, entry.th32ProcessID) {
                            Ok(process) => {
                                let _process_guard = HandleGuard(process);
                                if TerminateProcess(process, 0).is_ok() {
                                    debug!(process = %exe_name, pid = entry.th32ProcessID, "process terminated");
                                    if !closed.contains(&exe_lower) {
                                        closed.push(exe_lower.clone());
                                    }
                                } else {
                                    warn!(process = %exe_name, pid = entry.th32ProcessID, "could not terminate process");
                                }
                            }
                            Err(e) => {
                                warn!(process = %exe_name, error = %e, "could not open process for termination");
                            }
                        }
                        break;
                    }
                }

                entry.dwSize = std::mem::size_of::<PROCESSENTRY32W>() as u32;
                match Process32NextW(snapshot, &mut entry) {
                    Ok(_) => continue,
                    Err(e) => {
                        if e.code() == ERROR_NO_MORE_FILES.to_hresult() {
                            break;
                        }
                        return Err(anyhow::anyhow!("Failed to enumerate processes: {}", e));
                    }
                }
            }

            Ok(closed)
        }
    }

    pub fn launch(app: OfficeApp) -> Result<()> {
        // `start` resolves the executable through the App Paths registry key.
        Command::new("cmd")
            .args(["/C", "start", "", app.executable()])
            .spawn()
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Failed to launch {}: {}", app.display_name(), e))
    }

    pub fn open_in_explorer(target: &crate::folders::FolderTarget) -> Result<()> {
        Command::new("explorer")
            .arg(super::explorer_argument(target))
            .spawn()
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Failed to open folder: {}", e))
    }
}

#[cfg(windows)]
pub fn close_running_office_apps() -> Result<Vec<String>> {
    let closed = windows_impl::close_office_apps()?;
    if closed.is_empty() {
        debug!("no Office applications were running");
    } else {
        info!(closed = ?closed, "Office applications closed");
    }
    Ok(closed)
}

#[cfg(windows)]
pub fn launch_app(app: OfficeApp) {
    match windows_impl::launch(app) {
        Ok(()) => info!(app = app.display_name(), "application relaunched"),
        Err(e) => warn!(app = app.display_name(), error = %e, "relaunch failed"),
    }
}

#[cfg(windows)]
pub fn open_folder(target: &FolderTarget) {
    match windows_impl::open_in_explorer(target) {
        Ok(()) => info!(folder = %target.directory.display(), "folder opened"),
        Err(e) => warn!(folder = %target.directory.display(), error = %e, "could not open folder"),
    }
}

#[cfg(not(windows))]
pub fn close_running_office_apps() -> Result<Vec<String>> {
    debug!("application shutdown simulated (non-Windows)");
    Ok(Vec::new())
}

#[cfg(not(windows))]
pub fn launch_app(app: OfficeApp) {
    debug!(
        app = app.display_name(),
        exe = app.executable(),
        "application launch simulated (non-Windows)"
    );
}

#[cfg(not(windows))]
pub fn open_folder(target: &FolderTarget) {
    let argument = explorer_argument(target);
    debug!(
        folder = %target.directory.display(),
        argument = %argument.to_string_lossy(),
        "folder open simulated (non-Windows)"
    );
}
