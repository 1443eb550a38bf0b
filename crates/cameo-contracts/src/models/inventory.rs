use serde_json::Value;

/// Node type whose metadata lists the installed checkpoints.
pub const CHECKPOINT_LOADER_NODE: &str = "CheckpointLoaderSimple";

/// Well-known checkpoints, shown as suggestions when a server has nothing installed.
pub const POPULAR_CHECKPOINTS: &[&str] = &[
    "v1-5-pruned-emaonly.ckpt",
    "sd_xl_base_1.0.safetensors",
    "svd.safetensors",
    "svd_xt.safetensors",
    "dreamshaper_8.safetensors",
    "majicmixRealistic_v7.safetensors",
    "juggernautXL_v9Rdphoto2Lightning.safetensors",
    "epicrealism_natural_sin_rc1_vae.safetensors",
    "cyberrealistic_v33.safetensors",
    "realisticVisionV51_v51VAE.safetensors",
];

/// Checkpoints reported live by one connectivity check, in server order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelInventory {
    models: Vec<String>,
}

impl ModelInventory {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for model in models {
            let model = model.into();
            if model.trim().is_empty() || out.contains(&model) {
                continue;
            }
            out.push(model);
        }
        Self { models: out }
    }

    /// Reads `<node>.input.required.ckpt_name[0]` from an `/object_info/<node>` payload.
    ///
    /// A payload without that list is an empty inventory, not a parse failure.
    pub fn from_object_info(payload: &Value) -> Self {
        let names = payload
            .get(CHECKPOINT_LOADER_NODE)
            .and_then(|node| node.get("input"))
            .and_then(|input| input.get("required"))
            .and_then(|required| required.get("ckpt_name"))
            .and_then(|field| field.get(0))
            .and_then(Value::as_array)
            .map(|rows| {
                rows.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();
        Self::new(names)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.iter().any(|model| model == name)
    }

    pub fn first(&self) -> Option<&str> {
        self.models.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        self.models.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::ModelInventory;

    #[test]
    fn parses_checkpoint_loader_metadata() {
        let payload = json!({
            "CheckpointLoaderSimple": {
                "input": {
                    "required": {
                        "ckpt_name": [["sd_xl_base_1.0.safetensors", "v1-5-pruned-emaonly.ckpt"], {}]
                    }
                }
            }
        });
        let inventory = ModelInventory::from_object_info(&payload);
        assert_eq!(
            inventory.as_slice(),
            ["sd_xl_base_1.0.safetensors", "v1-5-pruned-emaonly.ckpt"]
        );
        assert_eq!(inventory.first(), Some("sd_xl_base_1.0.safetensors"));
    }

    #[test]
    fn missing_list_is_empty_inventory() {
        let inventory = ModelInventory::from_object_info(&json!({"CheckpointLoaderSimple": {}}));
        assert!(inventory.is_empty());
        assert!(ModelInventory::from_object_info(&json!([])).is_empty());
    }

    #[test]
    fn drops_blanks_and_duplicates_keeping_order() {
        let inventory = ModelInventory::new(["b.ckpt", " ", "a.ckpt", "b.ckpt"]);
        assert_eq!(inventory.as_slice(), ["b.ckpt", "a.ckpt"]);
        assert_eq!(inventory.len(), 2);
        assert!(inventory.contains("a.ckpt"));
    }

    #[test]
    fn reported_names_are_kept_verbatim() {
        let payload = json!({
            "CheckpointLoaderSimple": {
                "input": { "required": { "ckpt_name": [[" padded.ckpt", "\t", "plain.ckpt"], {}] } }
            }
        });
        let inventory = ModelInventory::from_object_info(&payload);
        assert_eq!(inventory.as_slice(), [" padded.ckpt", "plain.ckpt"]);
        assert!(inventory.contains(" padded.ckpt"));
        assert!(!inventory.contains("padded.ckpt"));
    }
}
