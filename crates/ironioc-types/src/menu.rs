//! Read-only menu (choice) tables.
//!
//! Menus are shared immutable string tables referenced by menu-typed field
//! descriptors. The canned menus the engine itself depends on (yes/no,
//! simulation mode, alarm severity, scan mechanism) are constructed here so
//! their choice indices are stable regardless of what definition files load.

use ironioc_error::{IocError, Result};

/// An enumerated choice table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    name: String,
    choices: Vec<String>,
}

impl Menu {
    pub fn new(name: impl Into<String>, choices: Vec<String>) -> Menu {
        Menu {
            name: name.into(),
            choices,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Choice string for an index.
    pub fn choice(&self, ix: u16) -> Option<&str> {
        self.choices.get(ix as usize).map(String::as_str)
    }

    /// Index of a choice string.
    pub fn index_of(&self, choice: &str) -> Result<u16> {
        self.choices
            .iter()
            .position(|c| c == choice)
            .map(|p| p as u16)
            .ok_or_else(|| IocError::BadChoice {
                menu: self.name.clone(),
                choice: choice.to_owned(),
            })
    }
}

/// Simulation mode choice indices for [`menu_sim_mode`].
pub mod sim_mode {
    pub const NO: u16 = 0;
    pub const YES: u16 = 1;
    pub const RAW: u16 = 2;
}

/// Scan mechanism choice indices for [`menu_scan`].
pub mod scan {
    pub const PASSIVE: u16 = 0;
    pub const EVENT: u16 = 1;
    pub const IO_INTR: u16 = 2;
    pub const PERIODIC_10S: u16 = 3;
    pub const PERIODIC_1S: u16 = 4;
    pub const PERIODIC_100MS: u16 = 5;
}

pub fn menu_yes_no() -> Menu {
    Menu::new("menuYesNo", vec!["NO".into(), "YES".into()])
}

pub fn menu_sim_mode() -> Menu {
    Menu::new(
        "menuSimm",
        vec!["NO".into(), "YES".into(), "RAW".into()],
    )
}

pub fn menu_alarm_severity() -> Menu {
    Menu::new(
        "menuAlarmSevr",
        vec![
            "NO_ALARM".into(),
            "MINOR".into(),
            "MAJOR".into(),
            "INVALID".into(),
        ],
    )
}

pub fn menu_alarm_status() -> Menu {
    Menu::new(
        "menuAlarmStat",
        (0..22)
            .map(|ix| crate::alarm::AlarmStatus::from_index(ix).name().to_owned())
            .collect(),
    )
}

pub fn menu_scan() -> Menu {
    Menu::new(
        "menuScan",
        vec![
            "Passive".into(),
            "Event".into(),
            "I/O Intr".into(),
            "10 second".into(),
            "1 second".into(),
            ".1 second".into(),
        ],
    )
}

/// Linear-conversion choices used by the analog records.
pub mod linr {
    pub const NO_CONVERSION: u16 = 0;
    pub const LINEAR: u16 = 1;
}

pub fn menu_convert() -> Menu {
    Menu::new(
        "menuConvert",
        vec!["NO CONVERSION".into(), "LINEAR".into()],
    )
}

/// Output mode select (supervisory vs closed loop) for output records.
pub mod omsl {
    pub const SUPERVISORY: u16 = 0;
    pub const CLOSED_LOOP: u16 = 1;
}

pub fn menu_omsl() -> Menu {
    Menu::new(
        "menuOmsl",
        vec!["supervisory".into(), "closed_loop".into()],
    )
}

/// Callback priority choices.
pub mod prio {
    pub const LOW: u16 = 0;
    pub const MEDIUM: u16 = 1;
    pub const HIGH: u16 = 2;
}

pub fn menu_priority() -> Menu {
    Menu::new(
        "menuPriority",
        vec!["LOW".into(), "MEDIUM".into(), "HIGH".into()],
    )
}

/// All canned menus, in registration order.
pub fn builtin_menus() -> Vec<Menu> {
    vec![
        menu_yes_no(),
        menu_sim_mode(),
        menu_alarm_severity(),
        menu_alarm_status(),
        menu_scan(),
        menu_convert(),
        menu_omsl(),
        menu_priority(),
    ]
}
