/*
 * form.rs
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

//! `application/x-www-form-urlencoded` body.

use crate::http::charset::Charset;
use crate::http::media_type::MediaType;
use crate::uri::encode_pairs;

/// Ordered (name, value) pairs encoded in a charset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBody {
    pairs: Vec<(String, String)>,
    charset: Charset,
}

impl FormBody {
    pub fn builder() -> FormBuilder {
        FormBuilder::default()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn content_type(&self) -> MediaType {
        MediaType::new("application", "x-www-form-urlencoded").with_charset(self.charset)
    }

    /// `n=v&n=v`, percent-encoded in the form charset.
    pub fn encode(&self) -> Vec<u8> {
        let encoded = encode_pairs(
            self.pairs.iter().map(|(n, v)| (n.as_str(), v.as_str())),
            self.charset,
        );
        encoded.into_bytes()
    }
}

/// Accumulates form pairs; `build` freezes them.
#[derive(Debug, Default)]
pub struct FormBuilder {
    pairs: Vec<(String, String)>,
    charset: Charset,
}

impl FormBuilder {
    pub fn add(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.pairs.push((name.into(), value.into()));
        self
    }

    /// One pair per value, in order.
    pub fn add_all<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        for value in values {
            self.pairs.push((name.clone(), value.into()));
        }
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn build(self) -> FormBody {
        FormBody {
            pairs: self.pairs,
            charset: self.charset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_pairs_in_order() {
        let form = FormBody::builder()
            .add("user", "jo smith")
            .add_all("tag", ["a&b", "c"])
            .build();
        assert_eq!(form.encode(), b"user=jo+smith&tag=a%26b&tag=c".to_vec());
        assert_eq!(
            form.content_type().to_string(),
            "application/x-www-form-urlencoded; charset=UTF-8"
        );
    }

    #[test]
    fn latin1_form() {
        let form = FormBody::builder().charset(Charset::Iso8859_1).add("n", "é").build();
        assert_eq!(form.encode(), b"n=%E9".to_vec());
    }
}
