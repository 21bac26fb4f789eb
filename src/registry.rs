//! Registry collaborator: an ordered-fallback value lookup plus the small
//! set of HKCU write primitives the MRU store needs. Lookups never error;
//! an absent key or value is simply `None`.

/// Key-value lookup consumed by the destination resolver. Kept as a trait so
/// the resolution chain can be exercised without a live registry.
#[cfg_attr(test, mockall::automock)]
pub trait RegistryLookup {
    /// Read a string value under HKCU. `None` for absent keys/values or any
    /// read failure.
    fn lookup(&self, key_path: &str, value_name: &str) -> Option<String>;
}

/// The real HKCU-backed lookup. On non-Windows hosts every read yields
/// `None`, which pushes the resolver down its fallback chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HkcuRegistry;

impl RegistryLookup for HkcuRegistry {
    fn lookup(&self, key_path: &str, value_name: &str) -> Option<String> {
        read_value(key_path, value_name)
    }
}

#[cfg(windows)]
mod windows_impl {
    use windows::core::{PCWSTR, PWSTR};
    use windows::Win32::Foundation::ERROR_SUCCESS;
    use windows::Win32::System::Registry::{
        RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegEnumKeyExW, RegEnumValueW,
        RegGetValueW, RegOpenKeyExW, RegSetValueExW, HKEY, HKEY_CURRENT_USER, KEY_ALL_ACCESS,
        KEY_READ, REG_OPTION_NON_VOLATILE, REG_SZ, RRF_RT_REG_EXPAND_SZ, RRF_RT_REG_SZ,
    };

    /// Convert a Rust string to a null-terminated wide string.
    fn to_wide_string(s: &str) -> Vec<u16> {
        use std::os::windows::ffi::OsStrExt;
        std::ffi::OsStr::new(s)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect()
    }

    fn from_wide(buffer: &[u16]) -> String {
        let len = buffer.iter().position(|&c| c == 0).unwrap_or(buffer.len());
        String::from_utf16_lossy(&buffer[..len])
    }

    /// RAII guard so an open key is always closed.
    struct KeyGuard(HKEY);

    impl Drop for KeyGuard {
        fn drop(&mut self) {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }

    fn open_key(key_path: &str, read_only: bool) -> Option<KeyGuard> {
        unsafe {
            let mut hkey = HKEY::default();
            let subkey_wide = to_wide_string(key_path);
            let access = if read_only { KEY_READ } else { KEY_ALL_ACCESS };
            let result = RegOpenKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR(subkey_wide.as_ptr()),
                0,
                access,
                &mut hkey,
            );
            if result != ERROR_SUCCESS {
                return None;
            }
            Some(KeyGuard(hkey))
        }
    }

    pub fn read_value(key_path: &str, value_name: &str) -> Option<String> {
        unsafe {
            let key = open_key(key_path, true)?;
            let value_name_wide = to_wide_string(value_name);

            // Query the size first, then read. RRF flags auto-expand
            // REG_EXPAND_SZ values.
            let mut buffer_size = 0u32;
            let result = RegGetValueW(
                key.0,
                PCWSTR::null(),
                PCWSTR(value_name_wide.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                None,
                None,
                Some(&mut buffer_size),
            );
            if result != ERROR_SUCCESS || buffer_size == 0 {
                return None;
            }

            let mut buffer = vec![0u16; (buffer_size / 2) as usize + 1];
            let result = RegGetValueW(
                key.0,
                PCWSTR::null(),
                PCWSTR(value_name_wide.as_ptr()),
                RRF_RT_REG_SZ | RRF_RT_REG_EXPAND_SZ,
                None,
                Some(buffer.as_mut_ptr() as *mut _),
                Some(&mut buffer_size),
            );
            if result != ERROR_SUCCESS {
                return None;
            }

            let value = from_wide(&buffer);
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
    }

    pub fn list_subkeys(key_path: &str) -> Vec<String> {
        unsafe {
            let mut names = Vec::new();
            let key = match open_key(key_path, true) {
                Some(key) => key,
                None => return names,
            };

            let mut index = 0u32;
            loop {
                let mut buffer = vec![0u16; 256];
                let mut len = buffer.len() as u32;
                let result = RegEnumKeyExW(
                    key.0,
                    index,
                    PWSTR(buffer.as_mut_ptr()),
                    &mut len,
                    None,
                    PWSTR::null(),
                    None,
                    None,
                );
                if result != ERROR_SUCCESS {
                    break;
                }
                names.push(from_wide(&buffer));
                index += 1;
            }
            names
        }
    }

    pub fn list_values(key_path: &str) -> Vec<(String, String)> {
        unsafe {
            let mut values = Vec::new();
            let key = match open_key(key_path, true) {
                Some(key) => key,
                None => return values,
            };

            let mut index = 0u32;
            loop {
                let mut name_buffer = vec![0u16; 512];
                let mut name_len = name_buffer.len() as u32;
                let mut data_buffer = vec![0u8; 8192];
                let mut data_len = data_buffer.len() as u32;
                let result = RegEnumValueW(
                    key.0,
                    index,
                    PWSTR(name_buffer.as_mut_ptr()),
                    &mut name_len,
                    None,
                    None,
                    Some(data_buffer.as_mut_ptr()),
                    Some(&mut data_len),
                );
                if result != ERROR_SUCCESS {
                    break;
                }
                let name = from_wide(&name_buffer);
                let data_wide: Vec<u16> = data_buffer[..data_len as usize]
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                values.push((name, from_wide(&data_wide)));
                index += 1;
            }
            values
        }
    }

    pub fn write_value(key_path: &str, value_name: &str, data: &str) -> bool {
        unsafe {
            let subkey_wide = to_wide_string(key_path);
            let mut hkey = HKEY::default();
            let result = RegCreateKeyExW(
                HKEY_CURRENT_USER,
                PCWSTR(subkey_wide.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_ALL_ACCESS,
                None,
                &mut hkey,
                None,
            );
            if result != ERROR_SUCCESS {
                return false;
            }
            let key = KeyGuard(hkey);

            let value_name_wide = to_wide_string(value_name);
            let data_wide = to_wide_string(data);
            let data_bytes =
                std::slice::from_raw_parts(data_wide.as_ptr() as *const u8, data_wide.len() * 2);
            let result = RegSetValueExW(
                key.0,
                PCWSTR(value_name_wide.as_ptr()),
                0,
                REG_SZ,
                Some(data_bytes),
            );
            result == ERROR_SUCCESS
        }
    }

    pub fn delete_value(key_path: &str, value_name: &str) -> bool {
        unsafe {
            let key = match open_key(key_path, false) {
                Some(key) => key,
                None => return false,
            };
            let value_name_wide = to_wide_string(value_name);
            RegDeleteValueW(key.0, PCWSTR(value_name_wide.as_ptr())) == ERROR_SUCCESS
        }
    }
}

#[cfg(windows)]
pub use windows_impl::{delete_value, list_subkeys, list_values, read_value, write_value};

// Off Windows there is no registry; reads come back empty and writes are
// accepted but dropped, the same degradation the host-side scripts use.
#[cfg(not(windows))]
mod portable_impl {
    use tracing::debug;

    pub fn read_value(key_path: &str, value_name: &str) -> Option<String> {
        debug!(key_path, value_name, "registry read simulated (non-Windows)");
        None
    }

    pub fn list_subkeys(_key_path: &str) -> Vec<String> {
        Vec::new()
    }

    pub fn list_values(_key_path: &str) -> Vec<(String, String)> {
        Vec::new()
    }

    pub fn write_value(key_path: &str, value_name: &str, _data: &str) -> bool {
        debug!(key_path, value_name, "registry write simulated (non-Windows)");
        true
    }

    pub fn delete_value(_key_path: &str, _value_name: &str) -> bool {
        true
    }
}

#[cfg(not(windows))]
pub use portable_impl::{delete_value, list_subkeys, list_values, read_value, write_value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mocked_lookup_drives_callers() {
        let mut mock = MockRegistryLookup::new();
        mock.expect_lookup()
            .withf(|key, value| key.contains("Word") && value == "PersonalTemplates")
            .returning(|_, _| Some(r"C:\Templates".to_string()));
        assert_eq!(
            mock.lookup(r"Software\Microsoft\Office\16.0\Word\Options", "PersonalTemplates"),
            Some(r"C:\Templates".to_string())
        );
    }

    #[cfg(not(windows))]
    #[test]
    fn simulated_reads_are_empty() {
        assert_eq!(read_value("Software\\Anything", "Value"), None);
        assert!(list_subkeys("Software\\Anything").is_empty());
    }
}
