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

//! SSH agent protocol client (C10): list identities, request signatures,
//! and manage keys held by a running `ssh-agent` over its IPC socket.

mod client;
mod msg;

pub use client::{AgentClient, Constraint, Error, Identity};
pub use msg::{SSH_AGENT_RSA_SHA2_256, SSH_AGENT_RSA_SHA2_512};
