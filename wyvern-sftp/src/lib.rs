// Copyright 2016 Pierre-Étienne Meunier
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The SFTP client (C9): runs the SFTP subsystem over a `wyvern-ssh`
//! session channel and exposes a filesystem-oriented API — stat/open/read/
//! write/list/rename/link operations, an optional stat cache, and
//! pipelined `put`/`get` transfers.

pub mod attrs;
pub mod client;
mod msg;
pub mod statcache;

pub use attrs::FileAttributes;
pub use client::{DirEntry, DirHandle, Error, FileHandle, ListField, PutMode, Sftp, SortDirection, StatVfs, StatusKind};
pub use msg::{SSH_FXF_APPEND, SSH_FXF_CREAT, SSH_FXF_EXCL, SSH_FXF_READ, SSH_FXF_TRUNC, SSH_FXF_WRITE};
