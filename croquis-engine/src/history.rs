use croquis_core::sketch::Element;
use tracing::debug;

/// 线性撤销/重做历史，每个条目是元素序列的完整深拷贝。
///
/// `cursor == None` 表示位于空草图之前（等价于 -1）。
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<Vec<Element>>,
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以加载得到的元素作为唯一条目重置历史。
    pub fn seed(&mut self, elements: &[Element]) {
        self.clear();
        if !elements.is_empty() {
            self.entries.push(elements.to_vec());
            self.cursor = Some(0);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// 记录一次提交后的快照。与当前条目结构相同则忽略并返回 `false`。
    pub fn push(&mut self, elements: &[Element]) -> bool {
        if self.current().is_some_and(|current| current == elements) {
            debug!(cursor = ?self.cursor, "快照与当前条目相同，跳过");
            return false;
        }
        let keep = self.cursor.map_or(0, |cursor| cursor + 1);
        self.entries.truncate(keep);
        self.entries.push(elements.to_vec());
        self.cursor = Some(self.entries.len() - 1);
        true
    }

    /// 后退一步并返回需要恢复的元素副本；退到最早条目之前时返回空序列。
    pub fn undo(&mut self) -> Option<Vec<Element>> {
        match self.cursor {
            None => None,
            Some(0) => {
                self.cursor = None;
                Some(Vec::new())
            }
            Some(cursor) => {
                self.cursor = Some(cursor - 1);
                Some(self.entries[cursor - 1].clone())
            }
        }
    }

    pub fn redo(&mut self) -> Option<Vec<Element>> {
        let next = self.next_index();
        if next < self.entries.len() {
            self.cursor = Some(next);
            Some(self.entries[next].clone())
        } else {
            None
        }
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        self.next_index() < self.entries.len()
    }

    #[inline]
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<&[Element]> {
        self.cursor.map(|cursor| self.entries[cursor].as_slice())
    }

    #[inline]
    fn next_index(&self) -> usize {
        self.cursor.map_or(0, |cursor| cursor + 1)
    }
}
