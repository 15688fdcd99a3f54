/*
 * provider.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Tramite, a pluggable synchronous HTTP client.
 *
 * Tramite is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Tramite is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Tramite.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Transport providers: `ClientBuilder` factories and the registry that resolves them.
//!
//! The registry is an ordinary value built at startup and shared by reference. The first provider
//! registered is the default; with none registered, the built-in direct transport is.

use std::sync::Arc;

use crate::http::client::{Client, DirectClient};
use crate::http::options::Options;

/// Name of the built-in provider.
pub const DIRECT: &str = "direct";

/// Factory for a transport implementation.
pub trait ClientBuilder: Send + Sync {
    /// Registry name; `None` registers under the implementing type's name.
    fn name(&self) -> Option<&str> {
        None
    }

    fn build(&self, options: Options) -> Box<dyn Client>;
}

/// Builder for `DirectClient`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectClientBuilder;

impl ClientBuilder for DirectClientBuilder {
    fn name(&self) -> Option<&str> {
        Some(DIRECT)
    }

    fn build(&self, options: Options) -> Box<dyn Client> {
        Box::new(DirectClient::new(options))
    }
}

/// Provider table in registration order.
#[derive(Clone)]
pub struct Registry {
    providers: Vec<(String, Arc<dyn ClientBuilder>)>,
    builtin: Arc<dyn ClientBuilder>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            builtin: Arc::new(DirectClientBuilder),
        }
    }

    /// Register `provider`. Re-registering a name replaces the factory in place.
    pub fn register<T: ClientBuilder + 'static>(&mut self, provider: T) -> &mut Self {
        let name = provider
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| std::any::type_name::<T>().to_string());
        let provider: Arc<dyn ClientBuilder> = Arc::new(provider);
        match self.providers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => {
                log::debug!("replacing HTTP client provider {}", name);
                entry.1 = provider;
            }
            None => {
                log::debug!("registering HTTP client provider {}", name);
                self.providers.push((name, provider));
            }
        }
        self
    }

    /// Default provider: first registered, else the built-in.
    pub fn get(&self) -> &dyn ClientBuilder {
        match self.providers.first() {
            Some((_, p)) => p.as_ref(),
            None => self.builtin.as_ref(),
        }
    }

    /// Provider registered under `name`; the built-in answers to `"direct"` unless overridden.
    pub fn get_named(&self, name: &str) -> Option<&dyn ClientBuilder> {
        self.providers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_ref())
            .or_else(|| (name == DIRECT).then(|| self.builtin.as_ref()))
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(n, _)| n.as_str())
    }

    /// Client from the default provider.
    pub fn client(&self, options: Options) -> Box<dyn Client> {
        self.get().build(options)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::error::Result;
    use crate::http::request::Request;
    use crate::http::response::Response;

    struct Fake {
        options: Options,
    }

    impl Client for Fake {
        fn options(&self) -> &Options {
            &self.options
        }

        fn execute_with(&self, _request: &Request, _options: &Options) -> Result<Response> {
            Err(crate::http::error::HttpError::invalid("fake"))
        }
    }

    struct Named(&'static str);

    impl ClientBuilder for Named {
        fn name(&self) -> Option<&str> {
            Some(self.0)
        }

        fn build(&self, options: Options) -> Box<dyn Client> {
            Box::new(Fake { options })
        }
    }

    struct Anonymous;

    impl ClientBuilder for Anonymous {
        fn build(&self, options: Options) -> Box<dyn Client> {
            Box::new(Fake { options })
        }
    }

    #[test]
    fn builtin_is_default_when_empty() {
        let registry = Registry::new();
        assert_eq!(registry.get().name(), Some(DIRECT));
        assert!(registry.get_named(DIRECT).is_some());
        assert!(registry.get_named("other").is_none());
        assert_eq!(registry.names().count(), 0);
    }

    #[test]
    fn first_registered_is_default() {
        let mut registry = Registry::new();
        registry.register(Named("alpha")).register(Named("beta"));
        assert_eq!(registry.get().name(), Some("alpha"));
        assert_eq!(registry.get_named("beta").and_then(|b| b.name()), Some("beta"));
        assert!(registry.get_named("gamma").is_none());
        assert_eq!(registry.get_named(DIRECT).and_then(|b| b.name()), Some(DIRECT));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["alpha", "beta"]);
    }

    #[test]
    fn unnamed_provider_uses_type_name() {
        let mut registry = Registry::new();
        registry.register(Anonymous);
        let name = registry.names().next().unwrap().to_string();
        assert!(name.ends_with("Anonymous"));
        assert!(registry.get_named(&name).is_some());
    }

    #[test]
    fn built_client_keeps_options() {
        let registry = Registry::new();
        let options = Options::builder().retry_count(2).build();
        let client = registry.client(options.clone());
        assert_eq!(client.options(), &options);
    }
}
