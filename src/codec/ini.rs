/// Minimal ordered INI model for the emulator's `configs.*.ini` files.
/// Reading is tolerant: comments, blank lines and lines without `=` are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl IniDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(text: &str) -> Self {
        let mut doc = Self::new();
        let mut current: Option<usize> = None;
        for line in text.lines() {
            let trimmed = line.trim().trim_start_matches('\u{feff}');
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('[') {
                let name = rest.split(']').next().unwrap_or_default().trim();
                current = Some(doc.section_index(name));
                continue;
            }
            let Some(index) = current else {
                continue;
            };
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            doc.sections[index].1.push((key.to_string(), value.trim().to_string()));
        }
        doc
    }

    fn section_index(&mut self, name: &str) -> usize {
        if let Some(index) = self.sections.iter().position(|(existing, _)| existing == name) {
            return index;
        }
        self.sections.push((name.to_string(), Vec::new()));
        self.sections.len() - 1
    }

    /// Start (or reopen) a section; keeps it even when it ends up empty.
    pub fn section(&mut self, name: &str) -> &mut Self {
        self.section_index(name);
        self
    }

    /// Set `key` in `section`, replacing an existing value in place.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> &mut Self {
        let index = self.section_index(section);
        let value = value.into();
        let entries = &mut self.sections[index].1;
        match entries.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.to_string(), value)),
        }
        self
    }

    pub fn set_flag(&mut self, section: &str, key: &str, value: bool) -> &mut Self {
        self.set(section, key, if value { "1" } else { "0" })
    }

    pub fn entries(&self, section: &str) -> &[(String, String)] {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .map(|(_, entries)| entries.as_slice())
            .unwrap_or(&[])
    }

    /// Last value for `key`, matching the emulator's "later wins" reading.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.entries(section)
            .iter()
            .rev()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn flag(&self, section: &str, key: &str) -> bool {
        matches!(self.get(section, key), Some("1") | Some("true"))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, entries) in &self.sections {
            out.push('[');
            out.push_str(name);
            out.push_str("]\n");
            for (key, value) in entries {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_sections_followed_by_blank_line() {
        let mut doc = IniDocument::new();
        doc.set_flag("main::connectivity", "offline", true)
            .set("main::connectivity", "listen_port", "47584")
            .set_flag("main::misc", "disable_overlay", false);
        assert_eq!(
            doc.render(),
            "[main::connectivity]\noffline=1\nlisten_port=47584\n\n[main::misc]\ndisable_overlay=0\n\n"
        );
    }

    #[test]
    fn parsing_skips_noise() {
        let text = "; generated\n\
                    orphan=1\n\
                    [app::dlcs]\n\
                    # comment\n\
                    unlock_all=0\n\
                    not a pair\n\
                    1001 = Soundtrack = Deluxe \n\
                    \n\
                    [app::paths]\n\
                    1001=dlc/ost\n";
        let doc = IniDocument::parse(text);
        assert_eq!(doc.entries("app::dlcs").len(), 2);
        assert_eq!(doc.get("app::dlcs", "1001"), Some("Soundtrack = Deluxe"));
        assert_eq!(doc.get("app::paths", "1001"), Some("dlc/ost"));
        assert!(doc.entries("missing").is_empty());
    }

    #[test]
    fn empty_sections_survive_render() {
        let mut doc = IniDocument::new();
        doc.section("app::dlcs");
        assert_eq!(doc.render(), "[app::dlcs]\n\n");
        assert_eq!(IniDocument::parse(&doc.render()), doc);
    }
}
