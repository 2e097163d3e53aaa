//! # clinic-rag
//!
//! Retrieval-augmented answering for a clinic's FAQ.
//!
//! FAQ entries are embedded with Gemini and stored in a Pinecone index.
//! Incoming chat messages are classified by keyword: FAQ questions are
//! answered from the nearest indexed entries, everything else receives the
//! scheduling prompt.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌───────────┐
//! │  FAQ JSON  │──▶│  Indexer   │──▶│  Vector   │
//! │            │   │ Embed+Batch│   │  Index    │
//! └────────────┘   └────────────┘   └─────┬─────┘
//!                                         │
//!            ┌────────────┐   ┌───────────▼──┐
//!  /chat ───▶│   Router   │──▶│ Retrieve +   │
//!            │  (intent)  │   │ Generate     │
//!            └────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! clinic-rag init                   # create the index, wait until ready
//! clinic-rag index                  # embed and upsert data/clinic_info.json
//! clinic-rag ask "Which insurance plans do you take?"
//! clinic-rag serve                  # POST /chat on 0.0.0.0:5000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration, environment secrets and overrides |
//! | [`error`] | Error kinds callers branch on |
//! | [`models`] | Core data types |
//! | [`faq`] | FAQ file loading and document construction |
//! | [`embedding`] | Embedding provider abstraction (Gemini) |
//! | [`vector_index`] | Vector index abstraction (Pinecone, in-memory) |
//! | [`indexer`] | Batched FAQ indexing |
//! | [`generation`] | Answer generation from retrieved context |
//! | [`rag`] | Retrieve-then-generate query path |
//! | [`router`] | Keyword intent routing for chat |
//! | [`services`] | Shared client graph |
//! | [`server`] | `/chat` HTTP server |
//! | [`http`] | Shared JSON-over-HTTP helper |
//! | [`retry`] | Bounded exponential backoff |
//! | [`progress`] | Indexing progress output |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod embedding;
pub mod error;
pub mod faq;
pub mod generation;
pub mod http;
pub mod indexer;
pub mod logging;
pub mod models;
pub mod progress;
pub mod rag;
pub mod retry;
pub mod router;
pub mod server;
pub mod services;
pub mod vector_index;
