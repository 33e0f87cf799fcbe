pub mod core;
pub mod analysis;
pub mod compression;
pub mod query;
pub mod fields;
pub mod document;
pub mod schema;
pub mod inflow;
pub mod writer;
pub mod index;
pub mod storage;
pub mod search;

pub use crate::core::config::Config;
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::index::JsonIndex;
pub use crate::search::results::{SearchHit, SearchResults};

/*
┌──────────────────────────────── WRITE PATH ────────────────────────────────┐
│                                                                            │
│  JsonIndexWriter::create / update / delete                                 │
│    └─ reserve root slot ── split per chunk (batch_size) ──┐                │
│                                                           ▼                │
│  Scheduler ── PriorityQueue (Highest > High > Medium > Low)                │
│    │            ▲                                                          │
│    │            └── BatchSource::pull (under CapacityControl ceiling)      │
│    ▼                                                                       │
│  WorkerPool threads ── ConvertJob ── DocumentBuilder ── FieldStrategy      │
│                                         │                                  │
│                                         ▼                                  │
│  SlotChain sink (reservation order) ── IndexState                          │
│                                          ├─ IndexWriter ── InvertedIndex   │
│                                          ├─ FieldInfoIndex                 │
│                                          └─ SchemaIndex                    │
│  commit ── segment file + segments_<gen> + segments.gen ── Directory       │
│                                                                            │
└────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── READ PATH ─────────────────────────────────┐
│                                                                            │
│  text ── lexer ── parser ── QueryAst ── optimizer ── QueryCache            │
│                                                         │                  │
│                  FieldInfoIndex ── lowering ◄───────────┘                  │
│                                       │                                    │
│                                       ▼                                    │
│                     Query + SortSpec ── Searcher ── rehydrate($source)     │
│                                                                            │
└────────────────────────────────────────────────────────────────────────────┘
*/
