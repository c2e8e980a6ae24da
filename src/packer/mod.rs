//! Batch packing for the analytics endpoint.
//!
//! The endpoint limits the characters per document, the serialized size of a
//! request, and the number of documents per request. [`pack_documents`]
//! turns an arbitrary list of texts into batches that respect all three,
//! splitting any text that cannot fit on its own.

use crate::models::{Batch, DocOrigin, Document};
use thiserror::Error;
use tracing::debug;

/// Request limits of the analytics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackingLimits {
    pub max_doc_chars: usize,
    pub max_batch_bytes: usize,
    pub max_batch_docs: usize,
    /// Part of `max_batch_bytes` set aside for fixed request headers.
    pub reserved_header_bytes: usize,
}

impl Default for PackingLimits {
    fn default() -> Self {
        Self {
            max_doc_chars: 5_000,
            max_batch_bytes: 1_000_000,
            max_batch_docs: 1_000,
            reserved_header_bytes: 0,
        }
    }
}

/// Packing failures. Both indicate a bug or a misconfiguration, never an
/// environmental fault.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackingError {
    #[error("invalid packing limits: {0}")]
    InvalidLimits(String),

    #[error("batch {batch} overflows its limits: {detail}")]
    Overflow { batch: usize, detail: String },
}

/// Split `text` into consecutive chunks of at most `max_chunk_chars`
/// characters. Concatenating the chunks gives back `text`.
///
/// Empty text yields no chunks. A `max_chunk_chars` of zero is treated as one.
pub fn split_text(text: &str, max_chunk_chars: usize) -> Vec<String> {
    let size = max_chunk_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == size {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Pack `texts` into batches, in input order.
///
/// Document ids are their position within the batch. Each document's
/// `origin` records which input (and which chunk of it) it came from.
pub fn pack_documents(texts: &[String], limits: &PackingLimits) -> Result<Vec<Batch>, PackingError> {
    let mut packer = Packer::new(limits)?;

    for (index, text) in texts.iter().enumerate() {
        packer.add(text, index)?;
    }

    let batches = packer.finish();
    verify(&batches, limits)?;

    debug!(
        "Packed {} text(s) into {} document(s) across {} batch(es)",
        texts.len(),
        batches.iter().map(Batch::len).sum::<usize>(),
        batches.len()
    );

    Ok(batches)
}

/// Serialized size of an empty batch envelope.
fn envelope_bytes() -> usize {
    Batch::default().serialized_size()
}

/// Bytes one document adds to a batch: its JSON plus the array separator.
fn document_cost(id: &str, text: &str) -> usize {
    Batch {
        documents: vec![Document::new(id, text)],
    }
    .serialized_size()
        - envelope_bytes()
        + 1
}

struct Packer<'a> {
    limits: &'a PackingLimits,
    /// Bytes available to documents in a fresh batch.
    budget: usize,
    remaining: usize,
    current: Vec<Document>,
    batches: Vec<Batch>,
}

impl<'a> Packer<'a> {
    fn new(limits: &'a PackingLimits) -> Result<Self, PackingError> {
        if limits.max_doc_chars == 0 {
            return Err(PackingError::InvalidLimits("max_doc_chars must be at least 1".into()));
        }
        if limits.max_batch_docs == 0 {
            return Err(PackingError::InvalidLimits("max_batch_docs must be at least 1".into()));
        }

        let overhead = envelope_bytes() + limits.reserved_header_bytes;
        let budget = limits.max_batch_bytes.saturating_sub(overhead);
        let smallest = document_cost(&limits.max_batch_docs.saturating_sub(1).to_string(), "");
        if budget < smallest {
            return Err(PackingError::InvalidLimits(format!(
                "max_batch_bytes {} cannot hold a single empty document ({} bytes of overhead)",
                limits.max_batch_bytes,
                overhead + smallest
            )));
        }

        Ok(Self {
            limits,
            budget,
            remaining: budget,
            current: Vec::new(),
            batches: Vec::new(),
        })
    }

    fn add(&mut self, text: &str, input_index: usize) -> Result<(), PackingError> {
        let mut pieces = Vec::new();
        self.pieces(text, &mut pieces)?;

        if pieces.len() == 1 {
            self.place(
                text,
                DocOrigin {
                    input_index,
                    chunk_index: None,
                },
            );
        } else {
            debug!("Split input {} into {} document(s)", input_index, pieces.len());
            for (chunk_index, piece) in pieces.iter().enumerate() {
                self.place(
                    piece,
                    DocOrigin {
                        input_index,
                        chunk_index: Some(chunk_index),
                    },
                );
            }
        }
        Ok(())
    }

    /// Whether `text` can stand as one document in an empty batch.
    fn fits_alone(&self, text: &str, chars: usize) -> bool {
        // Worst-case id keeps the decision independent of batch position
        let widest_id = (self.limits.max_batch_docs - 1).to_string();
        chars <= self.limits.max_doc_chars && document_cost(&widest_id, text) <= self.budget
    }

    /// Break `text` into pieces that each fit alone, in order.
    ///
    /// Texts over the character limit are cut at `max_doc_chars`; pieces that
    /// still exceed the byte budget (escaping, multi-byte characters) are
    /// halved until they fit.
    fn pieces(&self, text: &str, out: &mut Vec<String>) -> Result<(), PackingError> {
        let chars = text.chars().count();
        if self.fits_alone(text, chars) {
            out.push(text.to_string());
            return Ok(());
        }

        let chunk_chars = if chars > self.limits.max_doc_chars {
            self.limits.max_doc_chars
        } else if chars > 1 {
            chars.div_ceil(2)
        } else {
            return Err(PackingError::Overflow {
                batch: self.batches.len(),
                detail: format!("a single character needs more than the {} byte budget", self.budget),
            });
        };

        for chunk in split_text(text, chunk_chars) {
            self.pieces(&chunk, out)?;
        }
        Ok(())
    }

    /// Append one document, starting a new batch when the current one is full.
    fn place(&mut self, text: &str, origin: DocOrigin) {
        let id = self.current.len().to_string();
        let cost = document_cost(&id, text);
        if cost <= self.remaining && self.current.len() < self.limits.max_batch_docs {
            self.push(id, text, cost, Some(origin));
        } else {
            self.flush();
            let id = "0".to_string();
            let cost = document_cost(&id, text);
            self.push(id, text, cost, Some(origin));
        }
    }

    fn push(&mut self, id: String, text: &str, cost: usize, origin: Option<DocOrigin>) {
        self.remaining = self.remaining.saturating_sub(cost);
        self.current.push(Document {
            id,
            text: text.to_string(),
            origin,
        });
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.batches.push(Batch {
                documents: std::mem::take(&mut self.current),
            });
        }
        self.remaining = self.budget;
    }

    fn finish(mut self) -> Vec<Batch> {
        self.flush();
        self.batches
    }
}

/// Re-measure every batch against the limits.
fn verify(batches: &[Batch], limits: &PackingLimits) -> Result<(), PackingError> {
    let max_bytes = limits.max_batch_bytes.saturating_sub(limits.reserved_header_bytes);
    for (index, batch) in batches.iter().enumerate() {
        if batch.is_empty() {
            return Err(PackingError::Overflow {
                batch: index,
                detail: "empty batch".to_string(),
            });
        }
        if batch.len() > limits.max_batch_docs {
            return Err(PackingError::Overflow {
                batch: index,
                detail: format!("{} documents, limit {}", batch.len(), limits.max_batch_docs),
            });
        }
        let size = batch.serialized_size();
        if size > max_bytes {
            return Err(PackingError::Overflow {
                batch: index,
                detail: format!("{} bytes, limit {}", size, max_bytes),
            });
        }
        if let Some(doc) = batch
            .documents
            .iter()
            .find(|doc| doc.text.chars().count() > limits.max_doc_chars)
        {
            return Err(PackingError::Overflow {
                batch: index,
                detail: format!("document {} exceeds {} characters", doc.id, limits.max_doc_chars),
            });
        }
    }
    Ok(())
}
