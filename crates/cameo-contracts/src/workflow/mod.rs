mod graph;
mod template;

pub use graph::{link, GraphNode, JobGraph, JobHandle, NodeMeta};
pub use template::{build_job_graph, TemplateBindings, WorkflowTemplate, MAX_SEED};
