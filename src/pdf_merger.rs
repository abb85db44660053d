use anyhow::{anyhow, Result};
use lopdf::{Document, Object, ObjectId};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// `merge_paginated_artifacts(ordered_file_list) -> file`
///
/// Documents are appended in the order they were added.
pub struct PdfMerger {
    documents: Vec<(String, Document)>,
}

impl PdfMerger {
    pub fn new() -> Self {
        Self {
            documents: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub async fn add_pdf(&mut self, path: &Path) -> Result<()> {
        let data = fs::read(path)
            .await
            .map_err(|e| anyhow!("Failed to read PDF file {}: {}", path.display(), e))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.pdf")
            .to_string();
        self.add_bytes(name, &data)
    }

    pub fn add_bytes(&mut self, name: String, data: &[u8]) -> Result<()> {
        let document = Document::load_mem(data)
            .map_err(|e| anyhow!("Failed to parse PDF {}: {}", name, e))?;

        debug!("Loaded PDF with {} pages from {}", document.get_pages().len(), name);
        self.documents.push((name, document));
        Ok(())
    }

    /// Builds the merged document in memory.
    pub fn merge(&self) -> Result<Document> {
        let Some(((_, first), rest)) = self.documents.split_first() else {
            return Err(anyhow!("No PDFs added to merge"));
        };

        info!("Starting PDF merge process with {} documents", self.documents.len());

        let mut merged_doc = first.clone();
        let mut all_page_ids: Vec<ObjectId> = merged_doc.get_pages().into_values().collect();
        for page_id in &all_page_ids {
            flatten_inherited(&mut merged_doc, *page_id);
        }
        let mut max_id = merged_doc.max_id;

        for (name, document) in rest {
            debug!("Appending {} with {} pages", name, document.get_pages().len());

            let mut doc_copy = document.clone();
            doc_copy.renumber_objects_with(max_id + 1);
            max_id = doc_copy.max_id;

            let page_ids: Vec<ObjectId> = doc_copy.get_pages().into_values().collect();
            for page_id in &page_ids {
                flatten_inherited(&mut doc_copy, *page_id);
            }
            all_page_ids.extend(page_ids);
            merged_doc.objects.extend(doc_copy.objects);
        }
        merged_doc.max_id = max_id;

        let pages_id = merged_doc
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| anyhow!("Merged PDF has no page tree: {}", e))?;

        for page_id in &all_page_ids {
            if let Ok(Object::Dictionary(page)) = merged_doc.get_object_mut(*page_id) {
                page.set("Parent", Object::Reference(pages_id));
            }
        }

        let page_count = all_page_ids.len();
        let pages = merged_doc
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| anyhow!("Merged PDF page tree is not a dictionary: {}", e))?;
        pages.set(
            "Kids",
            Object::Array(all_page_ids.into_iter().map(Object::Reference).collect()),
        );
        pages.set("Count", Object::Integer(page_count as i64));

        info!("Finalizing merged PDF with {} total pages", page_count);
        Ok(merged_doc)
    }

    pub async fn save(&self, output_path: &Path) -> Result<()> {
        let mut merged_doc = self.merge()?;

        let mut data = Vec::new();
        merged_doc
            .save_to(&mut data)
            .map_err(|e| anyhow!("Failed to serialize merged PDF: {}", e))?;

        fs::write(output_path, data)
            .await
            .map_err(|e| anyhow!("Failed to write merged PDF to {}: {}", output_path.display(), e))?;

        info!("Successfully merged {} PDFs into {}", self.documents.len(), output_path.display());
        Ok(())
    }
}

const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Copies attributes a page inherits from its page-tree ancestors onto the
/// page itself, so it can be re-parented without losing them.
fn flatten_inherited(doc: &mut Document, page_id: ObjectId) {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return;
    };
    let mut missing: Vec<&[u8]> = INHERITABLE.into_iter().filter(|key| !page.has(key)).collect();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    let mut inherited = Vec::new();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if missing.is_empty() || depth > 32 {
            break;
        }
        let Ok(node) = doc.get_dictionary(parent_id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                inherited.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
    }

    if let Ok(page) = doc.get_dictionary_mut(page_id) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

impl Default for PdfMerger {
    fn default() -> Self {
        Self::new()
    }
}
