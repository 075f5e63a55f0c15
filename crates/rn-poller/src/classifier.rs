//! Vendor type-code classification.
//!
//! Each vendor family gets a lookup table; one generic poll loop is
//! parameterised by whichever table the configured vendor needs. Matching
//! is case-insensitive on the trimmed code. Anything not in the table is
//! `NotApplicable`, including blank codes.

use std::collections::HashMap;

use rn_common::{Classification, NotificationType};
use rn_config::{ClassifierPreset, ClassifierSettings};

use rn_common::NotificationType::{Deleted, Renewed, TransferIn, TransferOut};

const REST_CODES: &[(&str, NotificationType)] = &[
    ("TRANSFER_IN", TransferIn),
    ("TRANSFER_COMPLETED", TransferIn),
    ("INBOUND_TRANSFER", TransferIn),
    ("TRANSFER_OUT", TransferOut),
    ("OUTBOUND_TRANSFER", TransferOut),
    ("TRANSFER_AWAY", TransferOut),
    ("RENEWED", Renewed),
    ("RENEWAL", Renewed),
    ("AUTO_RENEWED", Renewed),
    ("DELETED", Deleted),
    ("DOMAIN_DELETED", Deleted),
    ("PURGED", Deleted),
];

const SOAP_CODES: &[(&str, NotificationType)] = &[
    ("1", TransferIn),
    ("2", TransferOut),
    ("3", Renewed),
    ("4", Deleted),
];

const EPP_CODES: &[(&str, NotificationType)] = &[
    ("transfer_in_approved", TransferIn),
    ("transfer_out_approved", TransferOut),
    ("renew_confirmed", Renewed),
    ("autorenew", Renewed),
    ("delete_confirmed", Deleted),
    ("purged", Deleted),
];

#[derive(Debug, Clone, Default)]
pub struct MessageClassifier {
    table: HashMap<String, NotificationType>,
}

impl MessageClassifier {
    /// Empty table: every code is `NotApplicable`
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, NotificationType)>,
        S: AsRef<str>,
    {
        let mut classifier = Self::new();
        for (raw, notification_type) in pairs {
            classifier.insert(raw.as_ref(), notification_type);
        }
        classifier
    }

    /// REST vendors: upper snake-case event names
    pub fn rest() -> Self {
        Self::from_pairs(REST_CODES.iter().copied())
    }

    /// SOAP vendors: numeric message type codes
    pub fn soap() -> Self {
        Self::from_pairs(SOAP_CODES.iter().copied())
    }

    /// EPP registries: poll reasons as normalised by the session client
    pub fn epp() -> Self {
        Self::from_pairs(EPP_CODES.iter().copied())
    }

    pub fn preset(preset: ClassifierPreset) -> Self {
        match preset {
            ClassifierPreset::Rest => Self::rest(),
            ClassifierPreset::Soap => Self::soap(),
            ClassifierPreset::Epp => Self::epp(),
            ClassifierPreset::None => Self::new(),
        }
    }

    /// Preset table overlaid with the configured mappings
    pub fn from_config(settings: &ClassifierSettings) -> Self {
        let mut classifier = Self::preset(settings.preset);
        for (raw, notification_type) in &settings.mappings {
            classifier.insert(raw, *notification_type);
        }
        classifier
    }

    pub fn with_mapping(mut self, raw: &str, notification_type: NotificationType) -> Self {
        self.insert(raw, notification_type);
        self
    }

    fn insert(&mut self, raw: &str, notification_type: NotificationType) {
        let key = normalize(raw);
        if !key.is_empty() {
            self.table.insert(key, notification_type);
        }
    }

    pub fn classify(&self, raw_type: &str) -> Classification {
        match self.table.get(&normalize(raw_type)) {
            Some(notification_type) => Classification::Applicable(*notification_type),
            None => Classification::NotApplicable,
        }
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}
