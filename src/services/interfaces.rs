use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::errors::{GoldbergError, Result};
use crate::utils::file::{mmap_read, write_atomic};

pub const INTERFACES_FILE: &str = "steam_interfaces.txt";

const INTERFACE_PREFIXES: [&str; 24] = [
    "SteamClient",
    "SteamGameServer",
    "SteamGameServerStats",
    "SteamUser",
    "SteamFriends",
    "SteamUtils",
    "SteamMatchMaking",
    "SteamMatchMakingServers",
    "STEAMUSERSTATS_INTERFACE_VERSION",
    "STEAMAPPS_INTERFACE_VERSION",
    "SteamNetworking",
    "STEAMREMOTESTORAGE_INTERFACE_VERSION",
    "STEAMSCREENSHOTS_INTERFACE_VERSION",
    "STEAMHTTP_INTERFACE_VERSION",
    "STEAMUNIFIEDMESSAGES_INTERFACE_VERSION",
    "STEAMUGC_INTERFACE_VERSION",
    "STEAMAPPLIST_INTERFACE_VERSION",
    "STEAMMUSIC_INTERFACE_VERSION",
    "STEAMMUSICREMOTE_INTERFACE_VERSION",
    "STEAMHTMLSURFACE_INTERFACE_VERSION_",
    "STEAMINVENTORY_INTERFACE_V",
    "SteamController",
    "SteamMasterServerUpdater",
    "STEAMVIDEO_INTERFACE_V",
];

const CONTROLLER_INTERFACE: &str = "STEAMCONTROLLER_INTERFACE_VERSION";
const VERSION_DIGITS: usize = 3;

fn occurrences<'a>(blob: &'a [u8], needle: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    blob.windows(needle.len())
        .enumerate()
        .filter(move |(_, window)| *window == needle)
        .map(|(offset, _)| offset)
}

/// Every `<prefix>NNN` in `blob`, as text.
fn versioned(blob: &[u8], prefix: &str) -> Vec<String> {
    let needle = prefix.as_bytes();
    occurrences(blob, needle)
        .filter_map(|offset| {
            let end = offset + needle.len() + VERSION_DIGITS;
            let found = blob.get(offset..end)?;
            if !found[needle.len()..].iter().all(u8::is_ascii_digit) {
                return None;
            }
            std::str::from_utf8(found).ok().map(str::to_string)
        })
        .collect()
}

pub fn extract_versioned_interface_strings(blob: &[u8]) -> BTreeSet<String> {
    let mut found: BTreeSet<String> = INTERFACE_PREFIXES
        .iter()
        .flat_map(|prefix| versioned(blob, prefix))
        .collect();

    let controller = versioned(blob, CONTROLLER_INTERFACE);
    if controller.is_empty() {
        if occurrences(blob, CONTROLLER_INTERFACE.as_bytes()).next().is_some() {
            found.insert(CONTROLLER_INTERFACE.to_string());
        }
    } else {
        found.extend(controller);
    }
    found
}

/// Scan an original Steam API binary and write `steam_interfaces.txt` beside it.
pub fn generate_interfaces_file(dll_path: &Path) -> Result<PathBuf> {
    let mapped = mmap_read(dll_path).map_err(|err| GoldbergError::config_io(dll_path, err))?;
    let interfaces = extract_versioned_interface_strings(&mapped);
    let dir = dll_path.parent().ok_or_else(|| {
        GoldbergError::Config(format!("{} has no parent directory", dll_path.display()))
    })?;
    let target = dir.join(INTERFACES_FILE);

    let mut contents = String::new();
    for name in &interfaces {
        contents.push_str(name);
        contents.push('\n');
    }
    write_atomic(&target, contents.as_bytes()).map_err(|err| GoldbergError::config_io(&target, err))?;
    tracing::info!("wrote {} interfaces to {}", interfaces.len(), target.display());
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use uuid::Uuid;

    #[test]
    fn finds_versioned_interfaces_in_binary_noise() {
        let mut blob = vec![0_u8, 0xFF, 0x10];
        blob.extend_from_slice(b"SteamClient017\0SteamUser019\0SteamUser02\0");
        blob.extend_from_slice(b"\x90\x90STEAMAPPS_INTERFACE_VERSION008\0SteamGameServerStats001\0");
        blob.extend_from_slice(b"STEAMCONTROLLER_INTERFACE_VERSION\0");

        let found: Vec<String> = extract_versioned_interface_strings(&blob).into_iter().collect();
        assert_eq!(
            found,
            vec![
                "STEAMAPPS_INTERFACE_VERSION008",
                "STEAMCONTROLLER_INTERFACE_VERSION",
                "SteamClient017",
                "SteamGameServerStats001",
                "SteamUser019",
            ]
        );
    }

    #[test]
    fn versioned_controller_interface_replaces_bare_literal() {
        let blob = b"STEAMCONTROLLER_INTERFACE_VERSION\0STEAMCONTROLLER_INTERFACE_VERSION003\0";
        let found = extract_versioned_interface_strings(blob);
        assert!(found.contains("STEAMCONTROLLER_INTERFACE_VERSION003"));
        assert!(!found.contains("STEAMCONTROLLER_INTERFACE_VERSION"));
    }

    #[test]
    fn interfaces_file_is_written_next_to_the_dll() {
        let dir = std::env::temp_dir().join(format!("goldberg-interfaces-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("temp dir");
        let dll = dir.join("steam_api_o.dll");
        fs::write(&dll, b"MZ\0SteamUtils009\0SteamFriends017\0").expect("dll");

        let target = generate_interfaces_file(&dll).expect("generate");
        assert_eq!(target, dir.join(INTERFACES_FILE));
        assert_eq!(
            fs::read_to_string(&target).expect("interfaces"),
            "SteamFriends017\nSteamUtils009\n"
        );
        let _ = fs::remove_dir_all(&dir);
    }
}
