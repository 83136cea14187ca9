use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageError {
    #[error("node {0:?} is not attached to the page")]
    Detached(NodeId),
    #[error("page lock poisoned")]
    Poisoned,
}

/// Element to create under a parent (the fill trigger, in practice).
#[derive(Debug, Clone, Default)]
pub struct ElementSpec {
    pub tag: &'static str,
    pub text: String,
    pub attrs: Vec<(&'static str, String)>,
    pub styles: Vec<(&'static str, String)>,
}

/// The slice of a page's DOM the agent needs. A browser host backs this with
/// the real document; `MemoryPage` backs it in tests and demos.
pub trait PageDom: Send + 'static {
    fn url(&self) -> String;
    /// Every attached `input` element, in document order.
    fn inputs(&self) -> Vec<NodeId>;
    fn attr(&self, node: NodeId, name: &str) -> Option<String>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    /// True if `node` is an `input` or has one among its descendants.
    fn contains_input(&self, node: NodeId) -> bool;
    fn inline_style(&self, node: NodeId, prop: &str) -> Option<String>;
    fn computed_style(&self, node: NodeId, prop: &str) -> Option<String>;
    /// An empty value removes the property.
    fn set_style(&mut self, node: NodeId, prop: &str, value: &str) -> Result<(), PageError>;
    fn data(&self, node: NodeId, key: &str) -> Option<String>;
    fn set_data(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), PageError>;
    fn append_element(&mut self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId, PageError>;
    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), PageError>;
    /// Fires a bubbling `input` event so page-side form logic sees the value.
    fn dispatch_input(&mut self, node: NodeId) -> Result<(), PageError>;
}

pub type SharedPage<D> = Arc<Mutex<D>>;

pub fn lock_page<D>(page: &SharedPage<D>) -> Result<MutexGuard<'_, D>, PageError> {
    page.lock().map_err(|_| PageError::Poisoned)
}

#[derive(Debug, Clone, Default)]
struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    data: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    text: String,
    value: String,
    input_events: usize,
    attached: bool,
}

/// Arena-backed document. Node 0 is `body`.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    url: String,
    nodes: Vec<Element>,
}

impl MemoryPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            nodes: vec![Element {
                tag: "body".to_string(),
                attached: true,
                ..Element::default()
            }],
        }
    }

    pub fn body(&self) -> NodeId {
        NodeId(0)
    }

    /// Builder used to lay out a page. An unknown parent yields a detached node.
    pub fn add(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let id = NodeId(self.nodes.len());
        let attached = self.nodes.get(parent.0).map(|p| p.attached).unwrap_or(false);
        self.nodes.push(Element {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            parent: attached.then_some(parent),
            attached,
            ..Element::default()
        });
        if attached {
            if let Some(p) = self.nodes.get_mut(parent.0) {
                p.children.push(id);
            }
        }
        id
    }

    /// Detaches `node` and its subtree.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes.get(node.0).and_then(|n| n.parent) {
            if let Some(p) = self.nodes.get_mut(parent.0) {
                p.children.retain(|c| *c != node);
            }
        }
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get_mut(id.0) {
                n.attached = false;
                stack.extend(n.children.iter().copied());
            }
        }
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.parent = None;
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.tag.as_str())
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.text.as_str())
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).map(|n| n.value.as_str())
    }

    pub fn input_events(&self, node: NodeId) -> usize {
        self.nodes.get(node.0).map(|n| n.input_events).unwrap_or(0)
    }

    fn live(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0).filter(|n| n.attached)
    }

    fn live_mut(&mut self, node: NodeId) -> Result<&mut Element, PageError> {
        self.nodes
            .get_mut(node.0)
            .filter(|n| n.attached)
            .ok_or(PageError::Detached(node))
    }

    fn document_order(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.body()];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(n) = self.nodes.get(id.0) {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }
}

impl PageDom for MemoryPage {
    fn url(&self) -> String {
        self.url.clone()
    }

    fn inputs(&self) -> Vec<NodeId> {
        self.document_order()
            .into_iter()
            .filter(|id| self.tag(*id) == Some("input"))
            .collect()
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.live(node)?.attrs.get(&name.to_ascii_lowercase()).cloned()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.live(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.live(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn contains_input(&self, node: NodeId) -> bool {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(n) = self.live(id) else { continue };
            if n.tag == "input" {
                return true;
            }
            stack.extend(n.children.iter().copied());
        }
        false
    }

    fn inline_style(&self, node: NodeId, prop: &str) -> Option<String> {
        self.live(node)?.style.get(prop).cloned()
    }

    fn computed_style(&self, node: NodeId, prop: &str) -> Option<String> {
        let n = self.live(node)?;
        if let Some(v) = n.style.get(prop) {
            return Some(v.clone());
        }
        match prop {
            "position" => Some("static".to_string()),
            "padding-right" => Some("0px".to_string()),
            _ => None,
        }
    }

    fn set_style(&mut self, node: NodeId, prop: &str, value: &str) -> Result<(), PageError> {
        let n = self.live_mut(node)?;
        if value.is_empty() {
            n.style.remove(prop);
        } else {
            n.style.insert(prop.to_string(), value.to_string());
        }
        Ok(())
    }

    fn data(&self, node: NodeId, key: &str) -> Option<String> {
        self.live(node)?.data.get(key).cloned()
    }

    fn set_data(&mut self, node: NodeId, key: &str, value: &str) -> Result<(), PageError> {
        self.live_mut(node)?
            .data
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn append_element(&mut self, parent: NodeId, spec: &ElementSpec) -> Result<NodeId, PageError> {
        self.live_mut(parent)?;
        let attrs: Vec<(&str, &str)> = spec.attrs.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let id = self.add(parent, spec.tag, &attrs);
        let n = self.live_mut(id)?;
        n.text = spec.text.clone();
        n.style = spec
            .styles
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Ok(id)
    }

    fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), PageError> {
        self.live_mut(node)?.value = value.to_string();
        Ok(())
    }

    fn dispatch_input(&mut self, node: NodeId) -> Result<(), PageError> {
        self.live_mut(node)?.input_events += 1;
        Ok(())
    }
}
