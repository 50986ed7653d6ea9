use std::sync::Arc;

use super::types::ToolId;
use crate::retrieval::Retriever;

/// Static `ToolId -> Retriever` table, fixed at construction.
#[derive(Clone)]
pub struct Toolbox {
    local: Arc<dyn Retriever>,
    web: Option<Arc<dyn Retriever>>,
}

impl Toolbox {
    pub fn new(local: Arc<dyn Retriever>, web: Option<Arc<dyn Retriever>>) -> Self {
        Self { local, web }
    }

    pub fn get(&self, tool: ToolId) -> Option<&Arc<dyn Retriever>> {
        match tool {
            ToolId::LocalDocuments => Some(&self.local),
            ToolId::WebSearch => self.web.as_ref(),
        }
    }

    /// Available tools in rotation order.
    pub fn available(&self) -> Vec<ToolId> {
        ToolId::ALL
            .into_iter()
            .filter(|tool| self.get(*tool).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::LocalSettings;
    use crate::retrieval::LocalDocumentRetriever;

    #[test]
    fn web_tool_absent_when_not_configured() {
        let local: Arc<dyn Retriever> =
            Arc::new(LocalDocumentRetriever::new(LocalSettings::default()));
        let toolbox = Toolbox::new(local.clone(), None);
        assert_eq!(toolbox.available(), vec![ToolId::LocalDocuments]);
        assert!(toolbox.get(ToolId::WebSearch).is_none());

        let toolbox = Toolbox::new(local.clone(), Some(local));
        assert_eq!(toolbox.available(), ToolId::ALL.to_vec());
    }
}
