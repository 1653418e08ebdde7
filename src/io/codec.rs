//! Binary encoding of values stored in data blocks.
//!
//! Little endian throughout. Every value starts with a one byte type tag;
//! strings are `[u32 len][bytes]`, vectors `[u64 count][elements]`.

use std::collections::BTreeMap;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use half::f16;

use crate::object::{
    CoordinateSystem, Data, Interpolation, MeshPrimitive, Object, PointsPrimitive,
    PrimitiveVariable, PrimitiveVariableMap,
};
use crate::util::{Box3d, DMat4, DVec3, Error, Name, Result, Vec2, Vec3};

const OBJECT_MESH: u8 = 0;
const OBJECT_POINTS: u8 = 1;
const OBJECT_COORDINATE_SYSTEM: u8 = 2;
const OBJECT_DATA: u8 = 3;

fn data_tag(data: &Data) -> u8 {
    match data {
        Data::Bool(_) => 0,
        Data::Int(_) => 1,
        Data::Float(_) => 2,
        Data::Double(_) => 3,
        Data::String(_) => 4,
        Data::V3f(_) => 5,
        Data::V3d(_) => 6,
        Data::Color3f(_) => 7,
        Data::M44d(_) => 8,
        Data::Box3d(_) => 9,
        Data::BoolVector(_) => 10,
        Data::IntVector(_) => 11,
        Data::FloatVector(_) => 12,
        Data::DoubleVector(_) => 13,
        Data::HalfVector(_) => 14,
        Data::StringVector(_) => 15,
        Data::InternedStringVector(_) => 16,
        Data::V2fVector(_) => 17,
        Data::V3fVector(_) => 18,
        Data::Color3fVector(_) => 19,
        Data::Compound(_) => 20,
    }
}

/// Growable output buffer. Writes into a `Vec` cannot fail.
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u32(&mut self, v: u32) {
        let _ = self.buf.write_u32::<LittleEndian>(v);
    }

    fn u64(&mut self, v: u64) {
        let _ = self.buf.write_u64::<LittleEndian>(v);
    }

    fn i32(&mut self, v: i32) {
        let _ = self.buf.write_i32::<LittleEndian>(v);
    }

    fn f32(&mut self, v: f32) {
        let _ = self.buf.write_f32::<LittleEndian>(v);
    }

    fn f64(&mut self, v: f64) {
        let _ = self.buf.write_f64::<LittleEndian>(v);
    }

    fn str(&mut self, s: &str) {
        self.u32(s.len() as u32);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn v3f(&mut self, v: Vec3) {
        self.f32(v.x);
        self.f32(v.y);
        self.f32(v.z);
    }

    fn v3d(&mut self, v: DVec3) {
        self.f64(v.x);
        self.f64(v.y);
        self.f64(v.z);
    }

    fn m44d(&mut self, m: &DMat4) {
        for v in m.to_cols_array() {
            self.f64(v);
        }
    }

    fn i32s(&mut self, v: &[i32]) {
        self.u64(v.len() as u64);
        for &x in v {
            self.i32(x);
        }
    }

    fn data(&mut self, data: &Data) {
        self.u8(data_tag(data));
        match data {
            Data::Bool(v) => self.u8(*v as u8),
            Data::Int(v) => self.i32(*v),
            Data::Float(v) => self.f32(*v),
            Data::Double(v) => self.f64(*v),
            Data::String(s) => self.str(s),
            Data::V3f(v) | Data::Color3f(v) => self.v3f(*v),
            Data::V3d(v) => self.v3d(*v),
            Data::M44d(m) => self.m44d(m),
            Data::Box3d(b) => {
                self.v3d(b.min);
                self.v3d(b.max);
            }
            Data::BoolVector(v) => {
                self.u64(v.len() as u64);
                for &b in v {
                    self.u8(b as u8);
                }
            }
            Data::IntVector(v) => self.i32s(v),
            Data::FloatVector(v) => {
                self.u64(v.len() as u64);
                for &x in v {
                    self.f32(x);
                }
            }
            Data::DoubleVector(v) => {
                self.u64(v.len() as u64);
                for &x in v {
                    self.f64(x);
                }
            }
            Data::HalfVector(v) => {
                self.u64(v.len() as u64);
                for x in v {
                    let _ = self.buf.write_u16::<LittleEndian>(x.to_bits());
                }
            }
            Data::StringVector(v) => {
                self.u64(v.len() as u64);
                for s in v {
                    self.str(s);
                }
            }
            Data::InternedStringVector(v) => {
                self.u64(v.len() as u64);
                for s in v {
                    self.str(s);
                }
            }
            Data::V2fVector(v) => {
                self.u64(v.len() as u64);
                for p in v {
                    self.f32(p.x);
                    self.f32(p.y);
                }
            }
            Data::V3fVector(v) | Data::Color3fVector(v) => {
                self.u64(v.len() as u64);
                for p in v {
                    self.v3f(*p);
                }
            }
            Data::Compound(c) => {
                self.u64(c.len() as u64);
                for (k, v) in c {
                    self.str(k);
                    self.data(v);
                }
            }
        }
    }

    fn variables(&mut self, vars: &PrimitiveVariableMap) {
        self.u64(vars.len() as u64);
        for (name, var) in vars {
            self.str(name);
            self.u8(var.interpolation.as_u8());
            self.data(&var.data);
            match &var.indices {
                Some(idx) => {
                    self.u8(1);
                    self.i32s(idx);
                }
                None => self.u8(0),
            }
        }
    }
}

/// Cursor over an encoded buffer.
struct Decoder<'a> {
    buf: &'a [u8],
}

fn truncated(_: std::io::Error) -> Error {
    Error::invalid("truncated value")
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn u8(&mut self) -> Result<u8> {
        self.buf.read_u8().map_err(truncated)
    }

    fn u32(&mut self) -> Result<u32> {
        self.buf.read_u32::<LittleEndian>().map_err(truncated)
    }

    fn u64(&mut self) -> Result<u64> {
        self.buf.read_u64::<LittleEndian>().map_err(truncated)
    }

    fn i32(&mut self) -> Result<i32> {
        self.buf.read_i32::<LittleEndian>().map_err(truncated)
    }

    fn f32(&mut self) -> Result<f32> {
        self.buf.read_f32::<LittleEndian>().map_err(truncated)
    }

    fn f64(&mut self) -> Result<f64> {
        self.buf.read_f64::<LittleEndian>().map_err(truncated)
    }

    /// Element count, rejected when it cannot fit in the remaining bytes.
    fn count(&mut self, min_elem_size: usize) -> Result<usize> {
        let n = self.u64()? as usize;
        if n.saturating_mul(min_elem_size) > self.buf.len() {
            return Err(Error::invalid(format!("count {n} exceeds remaining data")));
        }
        Ok(n)
    }

    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        if len > self.buf.len() {
            return Err(Error::invalid("truncated string"));
        }
        let (s, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(String::from_utf8(s.to_vec())?)
    }

    fn v3f(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.f32()?, self.f32()?, self.f32()?))
    }

    fn v3d(&mut self) -> Result<DVec3> {
        Ok(DVec3::new(self.f64()?, self.f64()?, self.f64()?))
    }

    fn m44d(&mut self) -> Result<DMat4> {
        let mut cols = [0.0; 16];
        for v in cols.iter_mut() {
            *v = self.f64()?;
        }
        Ok(DMat4::from_cols_array(&cols))
    }

    fn i32s(&mut self) -> Result<Vec<i32>> {
        let n = self.count(4)?;
        (0..n).map(|_| self.i32()).collect()
    }

    fn data(&mut self) -> Result<Data> {
        let tag = self.u8()?;
        Ok(match tag {
            0 => Data::Bool(self.u8()? != 0),
            1 => Data::Int(self.i32()?),
            2 => Data::Float(self.f32()?),
            3 => Data::Double(self.f64()?),
            4 => Data::String(self.string()?),
            5 => Data::V3f(self.v3f()?),
            6 => Data::V3d(self.v3d()?),
            7 => Data::Color3f(self.v3f()?),
            8 => Data::M44d(self.m44d()?),
            9 => Data::Box3d(Box3d::new(self.v3d()?, self.v3d()?)),
            10 => {
                let n = self.count(1)?;
                Data::BoolVector((0..n).map(|_| Ok(self.u8()? != 0)).collect::<Result<_>>()?)
            }
            11 => Data::IntVector(self.i32s()?),
            12 => {
                let n = self.count(4)?;
                Data::FloatVector((0..n).map(|_| self.f32()).collect::<Result<_>>()?)
            }
            13 => {
                let n = self.count(8)?;
                Data::DoubleVector((0..n).map(|_| self.f64()).collect::<Result<_>>()?)
            }
            14 => {
                let n = self.count(2)?;
                Data::HalfVector(
                    (0..n)
                        .map(|_| {
                            let bits = self.buf.read_u16::<LittleEndian>().map_err(truncated)?;
                            Ok(f16::from_bits(bits))
                        })
                        .collect::<Result<_>>()?,
                )
            }
            15 => {
                let n = self.count(4)?;
                Data::StringVector((0..n).map(|_| self.string()).collect::<Result<_>>()?)
            }
            16 => {
                let n = self.count(4)?;
                Data::InternedStringVector(
                    (0..n)
                        .map(|_| self.string().map(Name::from))
                        .collect::<Result<_>>()?,
                )
            }
            17 => {
                let n = self.count(8)?;
                Data::V2fVector(
                    (0..n)
                        .map(|_| Ok(Vec2::new(self.f32()?, self.f32()?)))
                        .collect::<Result<_>>()?,
                )
            }
            18 => {
                let n = self.count(12)?;
                Data::V3fVector((0..n).map(|_| self.v3f()).collect::<Result<_>>()?)
            }
            19 => {
                let n = self.count(12)?;
                Data::Color3fVector((0..n).map(|_| self.v3f()).collect::<Result<_>>()?)
            }
            20 => {
                let n = self.count(5)?;
                let mut c = BTreeMap::new();
                for _ in 0..n {
                    let k = self.string()?;
                    c.insert(k, self.data()?);
                }
                Data::Compound(c)
            }
            other => return Err(Error::invalid(format!("unknown data type tag {other}"))),
        })
    }

    fn variables(&mut self) -> Result<PrimitiveVariableMap> {
        let n = self.count(6)?;
        let mut vars = PrimitiveVariableMap::new();
        for _ in 0..n {
            let name = self.string()?;
            let interp = self.u8()?;
            let interpolation = Interpolation::from_u8(interp)
                .ok_or_else(|| Error::invalid(format!("unknown interpolation {interp}")))?;
            let data = self.data()?;
            let indices = match self.u8()? {
                0 => None,
                _ => Some(self.i32s()?),
            };
            vars.insert(name, PrimitiveVariable { interpolation, data, indices });
        }
        Ok(vars)
    }

    fn finish(self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid(format!("{} trailing bytes after value", self.buf.len())))
        }
    }
}

/// Encode a typed value.
pub fn encode_data(data: &Data) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.data(data);
    enc.buf
}

/// Decode a typed value.
pub fn decode_data(bytes: &[u8]) -> Result<Data> {
    let mut dec = Decoder::new(bytes);
    let data = dec.data()?;
    dec.finish()?;
    Ok(data)
}

/// Encode an object payload.
pub fn encode_object(object: &Object) -> Vec<u8> {
    let mut enc = Encoder::new();
    match object {
        Object::Mesh(m) => {
            enc.u8(OBJECT_MESH);
            enc.i32s(&m.vertices_per_face);
            enc.i32s(&m.vertex_ids);
            enc.str(&m.interpolation);
            enc.variables(&m.variables);
        }
        Object::Points(p) => {
            enc.u8(OBJECT_POINTS);
            enc.u64(p.num_points as u64);
            enc.variables(&p.variables);
        }
        Object::CoordinateSystem(c) => {
            enc.u8(OBJECT_COORDINATE_SYSTEM);
            enc.str(&c.name);
        }
        Object::Data(d) => {
            enc.u8(OBJECT_DATA);
            enc.data(d);
        }
    }
    enc.buf
}

/// Decode an object payload.
pub fn decode_object(bytes: &[u8]) -> Result<Object> {
    let mut dec = Decoder::new(bytes);
    let object = match dec.u8()? {
        OBJECT_MESH => Object::Mesh(MeshPrimitive {
            vertices_per_face: dec.i32s()?,
            vertex_ids: dec.i32s()?,
            interpolation: dec.string()?,
            variables: dec.variables()?,
        }),
        OBJECT_POINTS => Object::Points(PointsPrimitive {
            num_points: dec.u64()? as usize,
            variables: dec.variables()?,
        }),
        OBJECT_COORDINATE_SYSTEM => Object::CoordinateSystem(CoordinateSystem::new(dec.string()?)),
        OBJECT_DATA => Object::Data(dec.data()?),
        other => return Err(Error::invalid(format!("unknown object tag {other}"))),
    };
    dec.finish()?;
    Ok(object)
}

/// Encode a 4x4 transform sample.
pub fn encode_m44d(m: &DMat4) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.m44d(m);
    enc.buf
}

pub fn decode_m44d(bytes: &[u8]) -> Result<DMat4> {
    let mut dec = Decoder::new(bytes);
    let m = dec.m44d()?;
    dec.finish()?;
    Ok(m)
}

/// Encode a bound sample.
pub fn encode_box3d(b: &Box3d) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.v3d(b.min);
    enc.v3d(b.max);
    enc.buf
}

pub fn decode_box3d(bytes: &[u8]) -> Result<Box3d> {
    let mut dec = Decoder::new(bytes);
    let b = Box3d::new(dec.v3d()?, dec.v3d()?);
    dec.finish()?;
    Ok(b)
}

/// Encode a sorted list of names (tag sets, child orders).
pub fn encode_names<'a>(names: impl ExactSizeIterator<Item = &'a Name>) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.u64(names.len() as u64);
    for n in names {
        enc.str(n);
    }
    enc.buf
}

pub fn decode_names(bytes: &[u8]) -> Result<Vec<Name>> {
    let mut dec = Decoder::new(bytes);
    let n = dec.count(4)?;
    let names = (0..n)
        .map(|_| dec.string().map(Name::from))
        .collect::<Result<Vec<_>>>()?;
    dec.finish()?;
    Ok(names)
}

/// Encode sample times.
pub fn encode_f64s(values: &[f64]) -> Vec<u8> {
    let mut enc = Encoder::new();
    enc.u64(values.len() as u64);
    for &v in values {
        enc.f64(v);
    }
    enc.buf
}

pub fn decode_f64s(bytes: &[u8]) -> Result<Vec<f64>> {
    let mut dec = Decoder::new(bytes);
    let n = dec.count(8)?;
    let values = (0..n).map(|_| dec.f64()).collect::<Result<Vec<_>>>()?;
    dec.finish()?;
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Box3f;

    #[test]
    fn test_mesh_with_indexed_uvs() {
        let mut mesh = MeshPrimitive::create_box(Box3f::new(Vec3::splat(-1.0), Vec3::ONE));
        mesh.variables.insert(
            "uv".into(),
            PrimitiveVariable::indexed(
                Interpolation::FaceVarying,
                Data::V2fVector(vec![Vec2::ZERO, Vec2::ONE]),
                vec![0, 1, 1, 0].repeat(6),
            ),
        );
        let obj = Object::Mesh(mesh);
        assert_eq!(decode_object(&encode_object(&obj)).unwrap(), obj);
    }

    #[test]
    fn test_compound_and_half() {
        let mut c = BTreeMap::new();
        c.insert("f".to_string(), Data::HalfVector(vec![f16::from_f32(0.5)]));
        c.insert("m".to_string(), Data::M44d(DMat4::from_translation(DVec3::X)));
        c.insert(
            "names".to_string(),
            Data::InternedStringVector(vec![Name::from("a"), Name::from("b")]),
        );
        let data = Data::Compound(c);
        assert_eq!(decode_data(&encode_data(&data)).unwrap(), data);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_data(&[99]).is_err());
        assert!(decode_data(&[]).is_err());
        // Int followed by a stray byte
        assert!(decode_data(&[1, 0, 0, 0, 0, 7]).is_err());
        // Vector claiming more elements than bytes available
        let mut bad = vec![11u8];
        bad.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(decode_data(&bad).is_err());
        assert!(decode_object(&[42]).is_err());
    }
}
