//! Well-Known-Text reading and writing for the geometry kinds the API
//! delivers: `POINT`, `POLYGON` and `MULTIPOLYGON`.

use std::fmt::Write;

use geo::{Coord, LineString, MultiPolygon, Point, Polygon};
use tracing::warn;

use crate::error::GeometryError;
use crate::geometry::Geometry;
use crate::proj::{Crs, reproject};

/// Parse a WKT string. An EWKT `SRID=n;` prefix is accepted and ignored.
pub fn parse_wkt(wkt: &str) -> Result<Geometry, GeometryError> {
    let mut cursor = Cursor::new(wkt);
    cursor.skip_srid()?;
    let geometry = cursor.parse_geometry()?;
    cursor.skip_whitespace();
    if !cursor.at_end() {
        return Err(cursor.error("unexpected trailing characters"));
    }
    Ok(geometry)
}

/// Parse geographic WKT and project it for display, once.
pub fn read_geometry(wkt: &str) -> Result<Geometry, GeometryError> {
    let geometry = parse_wkt(wkt)?;
    Ok(reproject(&geometry, Crs::Epsg4326, Crs::Epsg3857))
}

/// Features for an optional WKT attribute: absent or malformed input yields
/// no features instead of an error, so the layer simply renders empty.
pub fn read_geometries(wkt: Option<&str>) -> Vec<Geometry> {
    let Some(wkt) = wkt.filter(|s| !s.trim().is_empty()) else {
        return Vec::new();
    };
    match read_geometry(wkt) {
        Ok(geometry) => vec![geometry],
        Err(e) => {
            warn!(error = %e, "skipping malformed geometry");
            Vec::new()
        }
    }
}

pub fn to_wkt(geometry: &Geometry) -> String {
    let mut out = String::new();
    match geometry {
        Geometry::Point(p) => {
            out.push_str("POINT(");
            write_coord(&mut out, p.0);
            out.push(')');
        }
        Geometry::Polygon(p) => {
            if p.exterior().0.is_empty() {
                out.push_str("POLYGON EMPTY");
            } else {
                out.push_str("POLYGON");
                write_polygon(&mut out, p);
            }
        }
        Geometry::MultiPolygon(mp) => {
            if mp.0.is_empty() {
                out.push_str("MULTIPOLYGON EMPTY");
            } else {
                out.push_str("MULTIPOLYGON(");
                for (i, p) in mp.0.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    write_polygon(&mut out, p);
                }
                out.push(')');
            }
        }
    }
    out
}

fn write_coord(out: &mut String, c: Coord<f64>) {
    let _ = write!(out, "{} {}", c.x, c.y);
}

fn write_ring(out: &mut String, ring: &LineString<f64>) {
    out.push('(');
    for (i, c) in ring.0.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_coord(out, *c);
    }
    out.push(')');
}

fn write_polygon(out: &mut String, polygon: &Polygon<f64>) {
    out.push('(');
    write_ring(out, polygon.exterior());
    for hole in polygon.interiors() {
        out.push(',');
        write_ring(out, hole);
    }
    out.push(')');
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            pos: 0,
        }
    }

    fn error(&self, message: &str) -> GeometryError {
        GeometryError::parse(self.pos, message)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), GeometryError> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }

    /// Consume `byte` if it is next, skipping whitespace first.
    fn eat(&mut self, byte: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn word(&mut self) -> String {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.bytes[start..self.pos]).to_ascii_uppercase()
    }

    fn skip_srid(&mut self) -> Result<(), GeometryError> {
        self.skip_whitespace();
        let rest = &self.bytes[self.pos..];
        if rest.len() >= 5 && rest[..5].eq_ignore_ascii_case(b"SRID=") {
            match rest.iter().position(|&b| b == b';') {
                Some(offset) => self.pos += offset + 1,
                None => return Err(self.error("SRID prefix without ';'")),
            }
        }
        Ok(())
    }

    /// `EMPTY` keyword in place of a coordinate list.
    fn eat_empty(&mut self) -> bool {
        let saved = self.pos;
        if self.word() == "EMPTY" {
            true
        } else {
            self.pos = saved;
            false
        }
    }

    fn parse_geometry(&mut self) -> Result<Geometry, GeometryError> {
        let start = self.pos;
        let kind = self.word();
        if kind.is_empty() {
            return Err(self.error("expected a geometry type"));
        }
        match kind.as_str() {
            "POINT" => {
                if self.eat_empty() {
                    return Err(self.error("empty points are not supported"));
                }
                self.expect(b'(')?;
                let c = self.number_pair()?;
                self.expect(b')')?;
                Ok(Geometry::Point(Point(c)))
            }
            "POLYGON" => {
                if self.eat_empty() {
                    return Ok(Geometry::Polygon(Polygon::new(LineString(vec![]), vec![])));
                }
                Ok(Geometry::Polygon(self.polygon()?))
            }
            "MULTIPOLYGON" => {
                if self.eat_empty() {
                    return Ok(Geometry::MultiPolygon(MultiPolygon(vec![])));
                }
                self.expect(b'(')?;
                let mut polygons = vec![self.polygon()?];
                while self.eat(b',') {
                    polygons.push(self.polygon()?);
                }
                self.expect(b')')?;
                Ok(Geometry::MultiPolygon(MultiPolygon(polygons)))
            }
            _ => {
                self.pos = start;
                Err(GeometryError::UnsupportedType(kind))
            }
        }
    }

    fn polygon(&mut self) -> Result<Polygon<f64>, GeometryError> {
        self.expect(b'(')?;
        let exterior = self.ring()?;
        let mut interiors = Vec::new();
        while self.eat(b',') {
            interiors.push(self.ring()?);
        }
        self.expect(b')')?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn ring(&mut self) -> Result<LineString<f64>, GeometryError> {
        self.expect(b'(')?;
        let mut coords = vec![self.number_pair()?];
        while self.eat(b',') {
            coords.push(self.number_pair()?);
        }
        self.expect(b')')?;
        if coords.len() < 3 {
            return Err(self.error("a ring needs at least three coordinates"));
        }
        Ok(LineString(coords))
    }

    fn number_pair(&mut self) -> Result<Coord<f64>, GeometryError> {
        let x = self.number()?;
        let y = self.number()?;
        // Tolerate a Z or M value; only the planar position is used.
        self.skip_whitespace();
        if self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.')
        {
            self.number()?;
        }
        Ok(Coord { x, y })
    }

    fn number(&mut self) -> Result<f64, GeometryError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|b| {
            b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E')
        }) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a number"));
        }
        let text = String::from_utf8_lossy(&self.bytes[start..self.pos]);
        let value = text.parse::<f64>().map_err(|_| {
            GeometryError::parse(start, format!("invalid number '{text}'"))
        })?;
        if !value.is_finite() {
            return Err(GeometryError::parse(start, "coordinate is not finite"));
        }
        Ok(value)
    }
}
