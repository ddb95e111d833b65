//! Outbound request body provider.
//!
//! An [`Entity`] supplies body bytes one chunk at a time: either a
//! fully composed literal (form fields, URL-encoded pairs) or a
//! multipart part header interleaved with sequential reads from a
//! backing storage entry, terminated by the closing boundary. Reads
//! are strictly sequential; there is no seeking and no re-reading.

use std::io::Read;

use bytes::Bytes;
use skiff_fs::Storage;

use crate::core::multipart::{FORM_DATA_CONTENT_TYPE, URLENCODED_CONTENT_TYPE, BOUNDARY, closing_boundary};
use crate::error::{Error, Result};

enum EntityBody {
    Literal {
        data: Bytes,
        emitted: bool,
    },
    FileBacked {
        /// `None` once closed.
        reader: Option<Box<dyn Read + Send>>,
        file_len: u64,
        /// File bytes consumed so far. Monotonic; reset only at
        /// entity creation.
        cursor: u64,
        prefix: Bytes,
        prefix_sent: bool,
        trailer_sent: bool,
    },
}

/// One outbound request body, owned for the lifetime of one request.
pub struct Entity {
    body: EntityBody,
    chunked: bool,
}

impl Entity {
    /// Entity over an already-composed literal payload.
    pub fn literal(data: impl Into<Bytes>) -> Self {
        Self {
            body: EntityBody::Literal {
                data: data.into(),
                emitted: false,
            },
            chunked: false,
        }
    }

    /// Entity streaming a storage entry, preceded by `prefix` (the
    /// multipart part header) and followed by the closing boundary.
    ///
    /// The backing entry is opened here, before dispatch, and released
    /// by [`Entity::close`] or drop.
    pub fn file_backed<S>(storage: &S, name: &str, prefix: impl Into<Bytes>) -> Result<Self>
    where
        S: Storage,
        S::Reader: Send + 'static,
    {
        let file_len = storage.len(name)?;
        let reader = storage.open(name)?;
        Ok(Self {
            body: EntityBody::FileBacked {
                reader: Some(Box::new(reader)),
                file_len,
                cursor: 0,
                prefix: prefix.into(),
                prefix_sent: false,
                trailer_sent: false,
            },
            chunked: false,
        })
    }

    /// Mark the body for chunked transfer encoding (no up-front
    /// content length on the wire).
    pub fn with_chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    pub fn is_chunked(&self) -> bool {
        self.chunked
    }

    /// `Content-Type` for this body, chosen by inspecting the literal
    /// for the multipart boundary marker.
    pub fn content_type(&self) -> &'static str {
        let literal: &[u8] = match &self.body {
            EntityBody::Literal { data, .. } => data,
            EntityBody::FileBacked { prefix, .. } => prefix,
        };
        if contains(literal, BOUNDARY.as_bytes()) {
            FORM_DATA_CONTENT_TYPE
        } else {
            URLENCODED_CONTENT_TYPE
        }
    }

    /// Total body length in bytes.
    pub fn content_length(&self) -> u64 {
        match &self.body {
            EntityBody::Literal { data, .. } => data.len() as u64,
            EntityBody::FileBacked {
                file_len, prefix, ..
            } => prefix.len() as u64 + file_len + closing_boundary().len() as u64,
        }
    }

    /// Next body chunk, at most `capacity` bytes; `Ok(None)` signals
    /// end of body.
    ///
    /// A storage read error is returned as-is and must be surfaced as
    /// a failed transfer; the provider never retries.
    pub fn read_chunk(&mut self, capacity: usize) -> Result<Option<Bytes>> {
        match &mut self.body {
            EntityBody::Literal { data, emitted } => {
                if *emitted {
                    return Ok(None);
                }
                if capacity < data.len() {
                    return Err(Error::BufferTooSmall {
                        capacity,
                        required: data.len(),
                    });
                }
                *emitted = true;
                Ok(Some(data.clone()))
            }
            EntityBody::FileBacked {
                reader,
                file_len,
                cursor,
                prefix,
                prefix_sent,
                trailer_sent,
            } => {
                let Some(rd) = reader.as_mut() else {
                    return Ok(None);
                };

                if !*prefix_sent || *cursor < *file_len {
                    let mut buf = Vec::with_capacity(capacity);
                    if !*prefix_sent {
                        // The part header must fit with room to spare
                        // for at least one file byte.
                        if capacity <= prefix.len() {
                            return Err(Error::BufferTooSmall {
                                capacity,
                                required: prefix.len() + 1,
                            });
                        }
                        buf.extend_from_slice(prefix);
                        *prefix_sent = true;
                    }

                    let want = (capacity - buf.len()) as u64;
                    let want = want.min(*file_len - *cursor);
                    if want > 0 {
                        let n = (&mut **rd)
                            .take(want)
                            .read_to_end(&mut buf)
                            .map_err(Error::Read)?;
                        if n == 0 {
                            return Err(Error::TruncatedFile);
                        }
                        *cursor += n as u64;
                    }
                    Ok(Some(Bytes::from(buf)))
                } else if !*trailer_sent {
                    *trailer_sent = true;
                    Ok(Some(Bytes::from(closing_boundary())))
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Release the backing file handle. Idempotent; further reads
    /// report end of body.
    pub fn close(&mut self) {
        if let EntityBody::FileBacked { reader, .. } = &mut self.body {
            reader.take();
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
