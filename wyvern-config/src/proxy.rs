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

//! `ProxyCommand` token expansion. Process launching itself is an external
//! collaborator (spec.md §1 "Deliberately OUT of scope"): this module only
//! expands the `%h`/`%p`/`%r` template into the literal command line a
//! caller then hands to whatever process-spawning facility it has.

/// Expand `%h` (remote host), `%p` (remote port) and `%r` (remote user,
/// if known) in an OpenSSH-style `ProxyCommand` template. `%%` escapes a
/// literal percent sign.
pub fn expand_template(template: &str, host: &str, port: u16, user: Option<&str>) -> String {
	let mut out = String::with_capacity(template.len());
	let mut chars = template.chars().peekable();
	while let Some(c) = chars.next() {
		if c != '%' {
			out.push(c);
			continue;
		}
		match chars.next() {
			Some('h') => out.push_str(host),
			Some('p') => out.push_str(&port.to_string()),
			Some('r') => out.push_str(user.unwrap_or("")),
			Some('%') => out.push('%'),
			Some(other) => {
				out.push('%');
				out.push(other);
			}
			None => out.push('%'),
		}
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn expands_host_and_port() {
		let cmd = expand_template("nc -x proxy:1080 %h %p", "example.com", 22, None);
		assert_eq!(cmd, "nc -x proxy:1080 example.com 22");
	}

	#[test]
	fn expands_user_and_literal_percent() {
		let cmd = expand_template("ssh -l %r %h %%d", "host", 2222, Some("alice"));
		assert_eq!(cmd, "ssh -l alice host %d");
	}
}
