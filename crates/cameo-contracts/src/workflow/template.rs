use serde_json::{json, Value};

use super::graph::{link, GraphNode, JobGraph};

/// Seeds are drawn below this bound.
pub const MAX_SEED: u64 = 1_000_000_000;

/// Node ids whose fields change per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateBindings {
    pub prompt_node: String,
    pub checkpoint_node: String,
    pub sampler_node: String,
}

/// Immutable workflow; every request gets its own copy from [`WorkflowTemplate::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowTemplate {
    graph: JobGraph,
    bindings: TemplateBindings,
}

impl WorkflowTemplate {
    pub fn new(graph: JobGraph, bindings: TemplateBindings) -> Result<Self, String> {
        let checks = [
            (&bindings.prompt_node, "text"),
            (&bindings.checkpoint_node, "ckpt_name"),
            (&bindings.sampler_node, "seed"),
        ];
        for (node_id, field) in checks {
            let Some(node) = graph.node(node_id) else {
                return Err(format!("template has no node '{node_id}'"));
            };
            if node.input(field).is_none() {
                return Err(format!(
                    "template node '{node_id}' ({}) has no '{field}' input",
                    node.class_type
                ));
            }
        }
        Ok(Self { graph, bindings })
    }

    /// Checkpoint -> prompt encoders -> sampler -> decoder -> writer.
    pub fn text_to_image() -> Self {
        let mut graph = JobGraph::new();
        graph.insert(
            "3",
            GraphNode::new(
                "KSampler",
                "KSampler",
                json!({
                    "seed": 0,
                    "steps": 20,
                    "cfg": 8,
                    "sampler_name": "euler",
                    "scheduler": "normal",
                    "denoise": 1,
                    "model": link("4", 0),
                    "positive": link("6", 0),
                    "negative": link("7", 0),
                    "latent_image": link("5", 0),
                }),
            ),
        );
        graph.insert(
            "4",
            GraphNode::new(
                "CheckpointLoaderSimple",
                "Load Checkpoint",
                json!({ "ckpt_name": "v1-5-pruned-emaonly.ckpt" }),
            ),
        );
        graph.insert(
            "5",
            GraphNode::new(
                "EmptyLatentImage",
                "Empty Latent Image",
                json!({ "width": 512, "height": 512, "batch_size": 1 }),
            ),
        );
        graph.insert(
            "6",
            GraphNode::new(
                "CLIPTextEncode",
                "CLIP Text Encode (Prompt)",
                json!({ "text": "", "clip": link("4", 1) }),
            ),
        );
        graph.insert(
            "7",
            GraphNode::new(
                "CLIPTextEncode",
                "CLIP Text Encode (Negative Prompt)",
                json!({ "text": "text, watermark", "clip": link("4", 1) }),
            ),
        );
        graph.insert(
            "8",
            GraphNode::new(
                "VAEDecode",
                "VAE Decode",
                json!({ "samples": link("3", 0), "vae": link("4", 2) }),
            ),
        );
        graph.insert(
            "9",
            GraphNode::new(
                "SaveImage",
                "Save Image",
                json!({ "filename_prefix": "ComfyUI", "images": link("8", 0) }),
            ),
        );

        Self {
            graph,
            bindings: TemplateBindings {
                prompt_node: "6".to_string(),
                checkpoint_node: "4".to_string(),
                sampler_node: "3".to_string(),
            },
        }
    }

    pub fn graph(&self) -> &JobGraph {
        &self.graph
    }

    pub fn bindings(&self) -> &TemplateBindings {
        &self.bindings
    }

    pub fn build(&self, prompt: &str, model: &str, seed: u64) -> JobGraph {
        let mut graph = self.graph.clone();
        set_input(&mut graph, &self.bindings.prompt_node, "text", Value::String(prompt.to_string()));
        set_input(
            &mut graph,
            &self.bindings.checkpoint_node,
            "ckpt_name",
            Value::String(model.to_string()),
        );
        set_input(&mut graph, &self.bindings.sampler_node, "seed", Value::from(seed));
        graph
    }
}

impl Default for WorkflowTemplate {
    fn default() -> Self {
        Self::text_to_image()
    }
}

pub fn build_job_graph(template: &WorkflowTemplate, prompt: &str, model: &str, seed: u64) -> JobGraph {
    template.build(prompt, model, seed)
}

fn set_input(graph: &mut JobGraph, node_id: &str, field: &str, value: Value) {
    if let Some(node) = graph.node_mut(node_id) {
        node.inputs.insert(field.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{build_job_graph, TemplateBindings, WorkflowTemplate};
    use crate::workflow::JobGraph;

    fn text(graph: &JobGraph, node: &str, field: &str) -> Value {
        graph
            .node(node)
            .and_then(|node| node.input(field))
            .cloned()
            .unwrap_or(Value::Null)
    }

    #[test]
    fn build_sets_only_mutable_fields() {
        let template = WorkflowTemplate::text_to_image();
        let graph = build_job_graph(&template, "a red bicycle", "sd_xl_base_1.0.safetensors", 42);

        assert_eq!(text(&graph, "6", "text"), json!("a red bicycle"));
        assert_eq!(text(&graph, "4", "ckpt_name"), json!("sd_xl_base_1.0.safetensors"));
        assert_eq!(text(&graph, "3", "seed"), json!(42));
        assert_eq!(text(&graph, "3", "steps"), json!(20));
        assert_eq!(text(&graph, "3", "sampler_name"), json!("euler"));
        assert_eq!(text(&graph, "7", "text"), json!("text, watermark"));
        assert_eq!(text(&graph, "5", "width"), json!(512));
        assert_eq!(graph.len(), template.graph().len());
    }

    #[test]
    fn build_is_pure() {
        let template = WorkflowTemplate::text_to_image();
        let pristine = template.clone();
        let first = template.build("boat", "a.ckpt", 7);
        let second = template.build("boat", "a.ckpt", 7);
        assert_eq!(first, second);
        assert_eq!(template, pristine);
        assert_eq!(text(template.graph(), "6", "text"), json!(""));
    }

    #[test]
    fn builds_differ_only_in_seed() {
        let template = WorkflowTemplate::text_to_image();
        let mut first = serde_json::to_value(template.build("boat", "a.ckpt", 1)).unwrap();
        let mut second = serde_json::to_value(template.build("boat", "a.ckpt", 2)).unwrap();
        assert_ne!(first, second);
        first["3"]["inputs"]["seed"] = json!(0);
        second["3"]["inputs"]["seed"] = json!(0);
        assert_eq!(first, second);
    }

    #[test]
    fn serializes_in_api_format() -> anyhow::Result<()> {
        let graph = WorkflowTemplate::text_to_image().build("boat", "a.ckpt", 3);
        let value = serde_json::to_value(&graph)?;
        assert_eq!(value["4"]["class_type"], json!("CheckpointLoaderSimple"));
        assert_eq!(value["4"]["_meta"]["title"], json!("Load Checkpoint"));
        assert_eq!(value["3"]["inputs"]["model"], json!(["4", 0]));
        let keys: Vec<&String> = value.as_object().map(|obj| obj.keys().collect()).unwrap_or_default();
        assert_eq!(keys, ["3", "4", "5", "6", "7", "8", "9"]);

        let restored: JobGraph = serde_json::from_value(value)?;
        assert_eq!(restored, graph);
        Ok(())
    }

    #[test]
    fn custom_template_must_bind_existing_fields() {
        let base = WorkflowTemplate::text_to_image();
        let bindings = TemplateBindings {
            prompt_node: "7".to_string(),
            checkpoint_node: "4".to_string(),
            sampler_node: "3".to_string(),
        };
        assert!(WorkflowTemplate::new(base.graph().clone(), bindings).is_ok());

        let broken = TemplateBindings {
            prompt_node: "5".to_string(),
            checkpoint_node: "4".to_string(),
            sampler_node: "3".to_string(),
        };
        let err = WorkflowTemplate::new(base.graph().clone(), broken).err().unwrap_or_default();
        assert_eq!(err, "template node '5' (EmptyLatentImage) has no 'text' input");
    }
}
