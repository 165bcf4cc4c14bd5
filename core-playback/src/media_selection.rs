//! Audible and legible media selection.

use bridge_traits::{MediaCharacteristic, MediaOption, NativeSelectionGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What is selected for a characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "option", rename_all = "snake_case")]
pub enum MediaSelectionOption {
    /// Let the platform decide (legible only).
    Automatic,
    /// Nothing selected (legible only).
    Off,
    On(MediaOption),
}

/// Alternative renditions offered for one characteristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSelectionGroup {
    pub characteristic: MediaCharacteristic,
    pub options: Vec<MediaOption>,
    pub selected: MediaSelectionOption,
}

impl MediaSelectionGroup {
    fn from_native(group: &NativeSelectionGroup) -> Self {
        let selected = match (&group.selected, group.characteristic) {
            (Some(id), _) => group
                .options
                .iter()
                .find(|option| &option.id == id)
                .cloned()
                .map(MediaSelectionOption::On)
                .unwrap_or(MediaSelectionOption::Automatic),
            (None, MediaCharacteristic::Legible) if group.allows_empty_selection => {
                MediaSelectionOption::Off
            }
            (None, _) => MediaSelectionOption::Automatic,
        };
        Self {
            characteristic: group.characteristic,
            options: group.options.clone(),
            selected,
        }
    }

    /// Selections that make sense for this group.
    pub fn available_selections(&self) -> Vec<MediaSelectionOption> {
        let mut selections = Vec::with_capacity(self.options.len() + 2);
        if self.characteristic == MediaCharacteristic::Legible {
            selections.push(MediaSelectionOption::Automatic);
            selections.push(MediaSelectionOption::Off);
        }
        selections.extend(self.options.iter().cloned().map(MediaSelectionOption::On));
        selections
    }

    /// Whether `selection` can be applied to this group.
    pub fn supports(&self, selection: &MediaSelectionOption) -> bool {
        match selection {
            MediaSelectionOption::Automatic | MediaSelectionOption::Off => {
                self.characteristic == MediaCharacteristic::Legible
            }
            MediaSelectionOption::On(option) => self.options.iter().any(|known| known.id == option.id),
        }
    }
}

/// Selection groups of the current item keyed by characteristic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSelection {
    groups: BTreeMap<MediaCharacteristic, MediaSelectionGroup>,
}

impl MediaSelection {
    pub fn from_native(groups: &[NativeSelectionGroup]) -> Self {
        Self {
            groups: groups
                .iter()
                .filter(|group| !group.options.is_empty())
                .map(|group| (group.characteristic, MediaSelectionGroup::from_native(group)))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn group(&self, characteristic: MediaCharacteristic) -> Option<&MediaSelectionGroup> {
        self.groups.get(&characteristic)
    }

    pub fn characteristics(&self) -> Vec<MediaCharacteristic> {
        self.groups.values().map(|group| group.characteristic).collect()
    }

    pub fn selected(&self, characteristic: MediaCharacteristic) -> Option<&MediaSelectionOption> {
        self.group(characteristic).map(|group| &group.selected)
    }

    /// Reports an empty native selection as automatic. The native player
    /// cannot tell the two apart, so the facade remembers which one was asked
    /// for.
    pub fn mark_automatic(&mut self, characteristic: MediaCharacteristic) {
        if let Some(group) = self.groups.get_mut(&characteristic) {
            if group.selected == MediaSelectionOption::Off {
                group.selected = MediaSelectionOption::Automatic;
            }
        }
    }
}

/// Native option id to select for `selection`; `None` clears the selection.
/// Automatic legible selection is expressed as clearing it too, which lets the
/// platform apply its own preferences.
pub fn native_option_id(selection: &MediaSelectionOption) -> Option<String> {
    match selection {
        MediaSelectionOption::On(option) => Some(option.id.clone()),
        MediaSelectionOption::Automatic | MediaSelectionOption::Off => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> MediaOption {
        MediaOption {
            id: id.to_string(),
            display_name: id.to_uppercase(),
            language: Some(id.to_string()),
        }
    }

    fn native_groups() -> Vec<NativeSelectionGroup> {
        vec![
            NativeSelectionGroup {
                characteristic: MediaCharacteristic::Legible,
                options: vec![option("en"), option("fr")],
                selected: None,
                allows_empty_selection: true,
            },
            NativeSelectionGroup {
                characteristic: MediaCharacteristic::Audible,
                options: vec![option("de"), option("it")],
                selected: Some("it".to_string()),
                allows_empty_selection: false,
            },
        ]
    }

    #[test]
    fn test_from_native() {
        let selection = MediaSelection::from_native(&native_groups());

        assert_eq!(
            selection.characteristics(),
            vec![MediaCharacteristic::Audible, MediaCharacteristic::Legible]
        );
        assert_eq!(
            selection.selected(MediaCharacteristic::Audible),
            Some(&MediaSelectionOption::On(option("it")))
        );
        assert_eq!(
            selection.selected(MediaCharacteristic::Legible),
            Some(&MediaSelectionOption::Off)
        );
    }

    #[test]
    fn test_groups_without_options_are_dropped() {
        let selection = MediaSelection::from_native(&[NativeSelectionGroup {
            characteristic: MediaCharacteristic::Legible,
            options: Vec::new(),
            selected: None,
            allows_empty_selection: true,
        }]);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_supported_selections() {
        let selection = MediaSelection::from_native(&native_groups());
        let legible = selection.group(MediaCharacteristic::Legible).unwrap();
        let audible = selection.group(MediaCharacteristic::Audible).unwrap();

        assert_eq!(legible.available_selections().len(), 4);
        assert!(legible.supports(&MediaSelectionOption::Off));
        assert!(!audible.supports(&MediaSelectionOption::Automatic));
        assert!(audible.supports(&MediaSelectionOption::On(option("de"))));
        assert!(!audible.supports(&MediaSelectionOption::On(option("xx"))));
        assert_eq!(native_option_id(&MediaSelectionOption::On(option("de"))), Some("de".to_string()));
        assert_eq!(native_option_id(&MediaSelectionOption::Off), None);
    }

    #[test]
    fn test_mark_automatic() {
        let mut selection = MediaSelection::from_native(&native_groups());
        selection.mark_automatic(MediaCharacteristic::Legible);
        selection.mark_automatic(MediaCharacteristic::Audible);

        assert_eq!(
            selection.selected(MediaCharacteristic::Legible),
            Some(&MediaSelectionOption::Automatic)
        );
        assert_eq!(
            selection.selected(MediaCharacteristic::Audible),
            Some(&MediaSelectionOption::On(option("it")))
        );
    }
}
