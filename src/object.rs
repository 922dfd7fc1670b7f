//! Objects: named code blocks with nested objects and data.

use std::fmt::Display;

use crate::prelude::{Block, YulString};

#[derive(Debug, Clone)]
pub struct Object {
    pub name: YulString,
    pub code: Block,
    pub sub_objects: Vec<ObjectNode>,
}

#[derive(Debug, Clone)]
pub struct Data {
    pub name: YulString,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub enum ObjectNode {
    Object(Object),
    Data(Data),
}

impl Object {
    /// Wraps a bare block the way `{ ... }` input is treated.
    pub fn from_code(code: Block) -> Self {
        Self {
            name: "object".into(),
            code,
            sub_objects: Vec::new(),
        }
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.sub_objects.iter_mut().filter_map(|node| match node {
            ObjectNode::Object(object) => Some(object),
            ObjectNode::Data(_) => None,
        })
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "object \"{}\" {{ code {}", self.name, self.code)?;
        for node in &self.sub_objects {
            match node {
                ObjectNode::Object(object) => write!(f, " {object}")?,
                ObjectNode::Data(data) => {
                    let hex: String = data.data.iter().map(|b| format!("{b:02x}")).collect();
                    write!(f, " data \"{}\" hex\"{hex}\"", data.name)?;
                }
            }
        }
        f.write_str(" }")
    }
}
