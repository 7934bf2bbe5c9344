use crate::model::Page;
use crate::services::catalog::PageSource;
use crate::services::executor::CancelToken;
use std::collections::HashMap;
use std::rc::Rc;

/// One live page plus the per-page state that lives and dies with it.
#[derive(Debug)]
pub struct Frame {
    /// Unique for the whole session; a reload yields a new id.
    pub id: u64,
    pub page: Rc<Page>,
    pub source: PageSource,
    /// Parent token for every command started on behalf of this page.
    pub cancel: CancelToken,
    pub selected: usize,
    pub filter: String,
    /// Dynamic preview text by item id. Items without an id are never cached.
    pub preview_cache: HashMap<String, String>,
}

impl Frame {
    fn new(id: u64, page: Page, source: PageSource) -> Self {
        Self {
            id,
            page: Rc::new(page),
            source,
            cancel: CancelToken::new(),
            selected: 0,
            filter: String::new(),
            preview_cache: HashMap::new(),
        }
    }
}

/// Ordered history of pages; the last frame is the visible one. Only these
/// operations mutate it.
#[derive(Debug, Default)]
pub struct NavStack {
    frames: Vec<Frame>,
    next_id: u64,
}

impl NavStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn push(&mut self, page: Page, source: PageSource) -> u64 {
        let id = self.alloc_id();
        log::debug!("push {} page (depth {})", page.kind(), self.frames.len() + 1);
        self.frames.push(Frame::new(id, page, source));
        id
    }

    /// Remove the top frame and stop everything it started.
    pub fn pop(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        frame.cancel.cancel();
        log::debug!("pop frame {} (depth {})", frame.id, self.frames.len());
        Some(frame)
    }

    /// Swap in a fresh page value for the top frame. The old frame's commands are
    /// cancelled and its preview cache discarded; cursor and filter carry over.
    pub fn replace_top(&mut self, page: Page) -> Option<u64> {
        let id = self.alloc_id();
        let top = self.frames.last_mut()?;
        top.cancel.cancel();
        let mut fresh = Frame::new(id, page, top.source.clone());
        fresh.filter = std::mem::take(&mut top.filter);
        fresh.selected = top.selected;
        log::debug!("replace frame {} with {}", top.id, id);
        *top = fresh;
        Some(id)
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn get(&self, id: u64) -> Option<&Frame> {
        self.frames.iter().find(|f| f.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut Frame> {
        self.frames.iter_mut().find(|f| f.id == id)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Cancel every frame, top first; used on shutdown.
    pub fn clear(&mut self) {
        while self.pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(title: &str) -> Page {
        crate::model::decode_page(&format!(r#"{{"type":"list","title":"{title}"}}"#)).unwrap()
    }

    #[test]
    fn push_pop_top_follow_lifo() {
        let mut s = NavStack::new();
        assert!(s.top().is_none());
        s.push(list("a"), PageSource::Inline);
        s.push(list("b"), PageSource::Inline);
        assert_eq!(s.depth(), 2);
        assert_eq!(s.top().unwrap().page.title(), Some("b"));
        let popped = s.pop().unwrap();
        assert_eq!(popped.page.title(), Some("b"));
        assert_eq!(s.top().unwrap().page.title(), Some("a"));
        s.pop();
        assert!(s.pop().is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn pop_cancels_the_frame_token() {
        let mut s = NavStack::new();
        s.push(list("a"), PageSource::Inline);
        let token = s.top().unwrap().cancel.child();
        s.pop();
        assert!(token.is_cancelled());
    }

    #[test]
    fn replace_top_swaps_page_and_keeps_cursor() {
        let mut s = NavStack::new();
        let first = s.push(list("a"), PageSource::File("/p.json".into()));
        {
            let top = s.top_mut().unwrap();
            top.selected = 3;
            top.filter = "q".into();
            top.preview_cache.insert("x".into(), "old".into());
        }
        let old_page = Rc::clone(&s.top().unwrap().page);
        let old_token = s.top().unwrap().cancel.clone();
        let second = s.replace_top(list("a2")).unwrap();

        assert_ne!(first, second);
        assert_eq!(s.depth(), 1);
        let top = s.top().unwrap();
        assert_eq!(top.page.title(), Some("a2"));
        assert_eq!(top.source, PageSource::File("/p.json".into()));
        assert_eq!(top.selected, 3);
        assert_eq!(top.filter, "q");
        assert!(top.preview_cache.is_empty());
        assert!(old_token.is_cancelled());
        assert!(!top.cancel.is_cancelled());
        // The old value is untouched.
        assert_eq!(old_page.title(), Some("a"));
    }

    #[test]
    fn replace_on_empty_stack_is_none() {
        let mut s = NavStack::new();
        assert!(s.replace_top(list("a")).is_none());
        assert!(s.is_empty());
    }

    #[test]
    fn lookup_by_frame_id() {
        let mut s = NavStack::new();
        let a = s.push(list("a"), PageSource::Inline);
        let b = s.push(list("b"), PageSource::Inline);
        assert!(s.get(a).is_some() && s.get(b).is_some());
        s.get_mut(a).unwrap().selected = 1;
        s.pop();
        assert!(s.get(b).is_none());
        assert_eq!(s.top().unwrap().selected, 1);
    }
}
