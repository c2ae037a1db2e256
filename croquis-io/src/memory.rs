use std::collections::HashMap;

use croquis_core::sketch::{Element, Sketch};

use crate::{IoError, SketchStore, SketchSummary, new_sketch_id, validate_sketch_id};

#[derive(Debug, Clone)]
struct StoredSketch {
    name: String,
    elements: Vec<Element>,
    revision: u64,
}

/// 进程内存储，用于测试与离线演示。
#[derive(Debug, Clone, Default)]
pub struct MemorySketchStore {
    sketches: HashMap<String, StoredSketch>,
    revision: u64,
}

impl MemorySketchStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sketches.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sketches.is_empty()
    }

    fn bump(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    fn entry_mut(&mut self, id: &str) -> Result<&mut StoredSketch, IoError> {
        self.sketches
            .get_mut(id)
            .ok_or_else(|| IoError::NotFound(id.to_string()))
    }
}

impl SketchStore for MemorySketchStore {
    fn list(&self) -> Result<Vec<SketchSummary>, IoError> {
        let mut entries: Vec<(&String, &StoredSketch)> = self.sketches.iter().collect();
        entries.sort_by(|(_, a), (_, b)| b.revision.cmp(&a.revision));
        Ok(entries
            .into_iter()
            .map(|(id, stored)| SketchSummary {
                id: id.clone(),
                name: stored.name.clone(),
                element_count: stored.elements.len(),
            })
            .collect())
    }

    fn load(&self, id: &str) -> Result<Sketch, IoError> {
        validate_sketch_id(id)?;
        let stored = self
            .sketches
            .get(id)
            .ok_or_else(|| IoError::NotFound(id.to_string()))?;
        Ok(Sketch::from_elements(
            Some(id.to_string()),
            stored.name.clone(),
            stored.elements.iter().cloned(),
        ))
    }

    fn save(&mut self, name: &str, elements: &[Element], id: Option<&str>) -> Result<String, IoError> {
        let id = match id {
            Some(id) => {
                validate_sketch_id(id)?;
                id.to_string()
            }
            None => new_sketch_id(),
        };
        let revision = self.bump();
        self.sketches.insert(
            id.clone(),
            StoredSketch {
                name: name.to_string(),
                elements: elements.to_vec(),
                revision,
            },
        );
        Ok(id)
    }

    fn delete(&mut self, id: &str) -> Result<(), IoError> {
        validate_sketch_id(id)?;
        self.sketches
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| IoError::NotFound(id.to_string()))
    }

    fn rename(&mut self, id: &str, name: &str) -> Result<(), IoError> {
        validate_sketch_id(id)?;
        let revision = self.bump();
        let stored = self.entry_mut(id)?;
        stored.name = name.to_string();
        stored.revision = revision;
        Ok(())
    }
}
