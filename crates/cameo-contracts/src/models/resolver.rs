use super::inventory::ModelInventory;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelResolution {
    pub model: String,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

impl ModelResolution {
    pub fn is_substitution(&self) -> bool {
        self.requested
            .as_deref()
            .map(|requested| requested != self.model)
            .unwrap_or(false)
    }
}

/// Maps a requested checkpoint onto one the server actually has.
///
/// Exact match wins, then the first entry (in reported order) related to the
/// request by case-insensitive substring in either direction, then the first
/// entry. Returns `None` only for an empty inventory.
pub fn resolve_model(requested: Option<&str>, inventory: &ModelInventory) -> Option<ModelResolution> {
    let default = inventory.first()?.to_string();
    let requested = requested.map(str::trim).filter(|value| !value.is_empty());

    let Some(requested) = requested else {
        return Some(ModelResolution {
            model: default,
            requested: None,
            fallback_reason: None,
        });
    };

    if inventory.contains(requested) {
        return Some(ModelResolution {
            model: requested.to_string(),
            requested: Some(requested.to_string()),
            fallback_reason: None,
        });
    }

    let needle = requested.to_lowercase();
    if let Some(matched) = inventory.iter().find(|candidate| {
        let candidate = candidate.to_lowercase();
        candidate.contains(&needle) || needle.contains(&candidate)
    }) {
        return Some(ModelResolution {
            model: matched.to_string(),
            requested: Some(requested.to_string()),
            fallback_reason: Some(format!(
                "Requested model '{requested}' not installed; using closest match '{matched}'."
            )),
        });
    }

    Some(ModelResolution {
        fallback_reason: Some(format!(
            "Requested model '{requested}' not installed; using default '{default}'."
        )),
        model: default,
        requested: Some(requested.to_string()),
    })
}
