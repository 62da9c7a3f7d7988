// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! telos-cortex: the Telos control plane.
//!
//! This library tracks which browser views exposed which agent processes to
//! untrusted content, decides whether those agents may still spawn processes,
//! and pushes enforcement decisions to the privileged Telos Core daemon over
//! a local Unix socket.

pub mod api;
pub mod config;
pub mod engine;
pub mod engine_core;
pub mod ipc;
pub mod service;
pub mod utils;
