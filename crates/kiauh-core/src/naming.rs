//! Instance naming: how many instances a family has, what they are called, and how names
//! are kept aligned between the Klipper and Moonraker families.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::answer;
use crate::error::Result;
use crate::input::{get_string_input, Answer, Prompter};
use crate::instance::{is_index_name, Component, Instance};

/// Position (0-based) to the name the instance at that position gets.
pub type NameDict = BTreeMap<usize, String>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NameScheme {
    Single,
    Index,
    Custom,
}

/// Classify a family from its suffixes.
pub fn detect_name_scheme<S: AsRef<str>>(suffixes: &[S]) -> NameScheme {
    match suffixes {
        [] => NameScheme::Single,
        [only] if only.as_ref().is_empty() => NameScheme::Single,
        _ if suffixes.iter().all(|s| is_index_name(s.as_ref())) => NameScheme::Index,
        _ => NameScheme::Custom,
    }
}

pub fn check_is_multi_install(existing: &[Instance], install_count: usize) -> bool {
    existing.is_empty() && install_count > 1
}

pub fn check_is_single_to_multi_conversion(existing: &[Instance]) -> bool {
    matches!(existing, [only] if only.is_single())
}

/// Pick a scheme for a new install, asking the operator only when more than one instance
/// is going to exist afterwards.
pub fn init_name_scheme(
    existing: &[Instance],
    install_count: usize,
    prompter: &mut dyn Prompter,
) -> Result<Answer<NameScheme>> {
    if check_is_multi_install(existing, install_count)
        || check_is_single_to_multi_conversion(existing)
    {
        info!(
            "You can now either assign custom names to the instances \
             or keep indexed names (1, 2, 3, ...)."
        );
        let custom = answer!(prompter.confirm("Assign custom names?", false)?);
        Ok(Answer::Value(if custom {
            NameScheme::Custom
        } else {
            NameScheme::Index
        }))
    } else {
        Ok(Answer::Value(NameScheme::Single))
    }
}

/// Adopt an existing family's names when they must win over a fresh choice.
///
/// If the other family already has more instances, its names and scheme are taken over
/// position by position. Otherwise, a family that is already multi-instance keeps its own.
pub fn update_name_scheme(
    scheme: NameScheme,
    name_dict: &mut NameDict,
    this_family: &[Instance],
    other_family: &[Instance],
) -> NameScheme {
    if other_family.len() > this_family.len() {
        update_name_dict(name_dict, other_family);
        detect_name_scheme(&crate::instance::suffixes(other_family))
    } else if this_family.len() > 1 {
        update_name_dict(name_dict, this_family);
        detect_name_scheme(&crate::instance::suffixes(this_family))
    } else {
        scheme
    }
}

pub fn update_name_dict(name_dict: &mut NameDict, instances: &[Instance]) {
    for (k, instance) in instances.iter().enumerate() {
        name_dict.insert(k, instance.suffix.clone());
    }
}

/// Fill every unnamed position according to `scheme`.
pub fn handle_instance_naming(
    name_dict: &mut NameDict,
    scheme: NameScheme,
    component: Component,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    if scheme == NameScheme::Single {
        return Ok(Answer::Value(()));
    }
    let keys: Vec<usize> = name_dict.keys().copied().collect();
    for k in keys {
        if !name_dict[&k].is_empty() {
            continue;
        }
        match scheme {
            NameScheme::Index => {
                // a family with gaps (1, 3) already holds some of the position numbers
                let mut index = k + 1;
                while name_dict.values().any(|n| *n == index.to_string()) {
                    index += 1;
                }
                name_dict.insert(k, index.to_string());
            }
            NameScheme::Custom => {
                answer!(assign_custom_name(k, name_dict, component, prompter)?);
            }
            NameScheme::Single => unreachable!(),
        }
    }
    Ok(Answer::Value(()))
}

/// Ask for the name of position `key`, refusing reserved names and names already taken
/// in this batch.
pub fn assign_custom_name(
    key: usize,
    name_dict: &mut NameDict,
    component: Component,
    prompter: &mut dyn Prompter,
) -> Result<Answer<()>> {
    let mut existing: Vec<String> = component.blacklist().iter().map(|s| s.to_string()).collect();
    existing.extend(name_dict.values().filter(|n| !n.is_empty()).cloned());
    let question = format!("Enter name for instance {}", key + 1);
    let name = answer!(get_string_input(prompter, &question, &existing)?);
    name_dict.insert(key, name);
    Ok(Answer::Value(()))
}
