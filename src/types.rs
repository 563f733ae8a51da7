//! Definitions of types used inside mp4 boxes.
//!
//! Fundamental types (FourCC, Time, language codes, fixed point
//! numbers, sized arrays) that know how to serialize themselves.
use std::fmt::{Debug, Display, Write};
use std::io;
use std::mem;

use chrono::{offset::Local, TimeZone};

use crate::mp4box::FullBox;
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};

// Convenience macro to implement FromBytes/ToBytes for newtypes.
macro_rules! def_from_to_bytes_newtype {
    ($newtype:ident, $type:ty) => {
        impl FromBytes for $newtype {
            fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
                Ok($newtype(<$type>::from_bytes(stream)?))
            }
            fn min_size() -> usize {
                <$type>::min_size()
            }
        }
        impl ToBytes for $newtype {
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                self.0.to_bytes(stream)
            }
        }
    };
}

// 32 bits in version 0 boxes, 64 bits in version 1 boxes.
macro_rules! def_from_to_bytes_versioned {
    ($newtype:ident) => {
        def_from_to_bytes_versioned!($newtype, 0xffffffff);
    };
    ($newtype:ident, $max:expr) => {
        impl FromBytes for $newtype {
            fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
                Ok(match stream.version() {
                    1 => $newtype(u64::from_bytes(stream)?),
                    _ => $newtype(u32::from_bytes(stream)? as u64),
                })
            }
            fn min_size() -> usize {
                u32::min_size()
            }
        }
        impl ToBytes for $newtype {
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                match stream.version() {
                    1 => self.0.to_bytes(stream)?,
                    _ => (std::cmp::min(self.0, $max as u64) as u32).to_bytes(stream)?,
                }
                Ok(())
            }
        }
        impl FullBox for $newtype {
            fn version(&self) -> Option<u8> {
                if self.0 <= $max {
                    None
                } else {
                    Some(1)
                }
            }
        }
        impl From<$newtype> for u64 {
            fn from(t: $newtype) -> u64 {
                t.0
            }
        }
        impl From<u64> for $newtype {
            fn from(t: u64) -> $newtype {
                $newtype(t)
            }
        }
    };
}

/// 32 bits in boxes with version 0, 64 bits in boxes with version >= 1.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionSizedUint(pub u64);
def_from_to_bytes_versioned!(VersionSizedUint);

impl Debug for VersionSizedUint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// Duration, 32/64 bits. Saturates to "all ones" ("unknown") in version 0.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Duration_(pub u64);
def_from_to_bytes_versioned!(Duration_, 0x7fffffff);

impl Debug for Duration_ {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

// TZ=UTC date +%s -d "1904-01-01 00:00:00"
const OFFSET_TO_UNIX: i64 = 2082844800;

/// Time, measured in seconds since 01-01-1904 00:00:00. 32/64 bits.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Time(pub u64);
def_from_to_bytes_versioned!(Time);

impl Time {
    /// Convert a unix timestamp (seconds since 1970) to mp4 time.
    pub fn from_unix(secs: i64) -> Time {
        Time((secs + OFFSET_TO_UNIX).max(0) as u64)
    }

    pub fn to_unix(&self) -> i64 {
        self.0 as i64 - OFFSET_TO_UNIX
    }
}

impl Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match Local.timestamp_opt(self.to_unix(), 0).single() {
            Some(tm) => write!(f, "{:?}", tm.to_rfc3339()),
            None => write!(f, "Time({})", self.0),
        }
    }
}

/// FourCC is the 4-byte name of any box.
///
/// Usually four bytes of ASCII, but it could be anything.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FourCC(pub u32);
def_from_to_bytes_newtype!(FourCC, u32);

impl FourCC {
    pub const fn new(s: &str) -> FourCC {
        let b = s.as_bytes();
        FourCC(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[inline]
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    fn fmt_fourcc(&self, dbg: bool) -> String {
        let c = self.to_be_bytes();
        for i in 0..4 {
            if c[i] < 32 || c[i] > 126 {
                return format!("0x{:x}", self.0);
            }
        }
        let mut s = String::new();
        if dbg {
            s.push('"');
        }
        for i in 0..4 {
            s.push(c[i] as char);
        }
        if dbg {
            s.push('"');
        }
        s
    }
}

// Let `if fourcc == b"moov"` work.
impl std::cmp::PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.to_be_bytes() == *other
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fmt_fourcc(true))
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fmt_fourcc(false))
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(b: &[u8; 4]) -> FourCC {
        FourCC(u32::from_be_bytes(*b))
    }
}

/// Language code ('eng', 'dut', 'fra', etc).
///
/// A 16-bit value containing 3 5-bit values that are interpreted as
/// letters (each letter minus 0x60), packed below a pad bit.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct IsoLanguageCode(pub u16);
def_from_to_bytes_newtype!(IsoLanguageCode, u16);

impl IsoLanguageCode {
    /// Pack a 3-letter ISO-639-2/T code. Falls back to "und" (with a
    /// warning) on anything that is not exactly 3 lowercase letters.
    pub fn from_code(code: &str) -> IsoLanguageCode {
        // Strip off the subtag, if any.
        let main = match code.find('-') {
            Some(idx) => &code[..idx],
            None => code,
        };
        let b = main.as_bytes();
        if b.len() != 3 || !b.iter().all(|c| c.is_ascii_lowercase()) {
            if !main.is_empty() {
                log::warn!("'{}' is not a valid ISO-639-2 language code, using 'und'", main);
            }
            return IsoLanguageCode::default();
        }
        let mut v = 0u16;
        for c in b {
            v = (v << 5) | ((c - 0x60) as u16);
        }
        IsoLanguageCode(v)
    }
}

impl Display for IsoLanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = String::new();
        s.push((((self.0 >> 10) & 0x1f) as u8 + 0x60) as char);
        s.push((((self.0 >> 5) & 0x1f) as u8 + 0x60) as char);
        s.push(((self.0 & 0x1f) as u8 + 0x60) as char);
        write!(f, "{}", s)
    }
}

impl Debug for IsoLanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl Default for IsoLanguageCode {
    fn default() -> IsoLanguageCode {
        // "und"
        IsoLanguageCode(0x55c4)
    }
}

/// Zero terminated ASCII string.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ZString(pub String);

impl ZString {
    pub fn as_str(&self) -> &str {
        match self.0.strip_suffix('\0') {
            Some(s) => s,
            None => self.0.as_str(),
        }
    }
}

impl From<&str> for ZString {
    fn from(s: &str) -> ZString {
        let mut s = s.to_string();
        s.push('\0');
        ZString(s)
    }
}

impl std::ops::Deref for ZString {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl FromBytes for ZString {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        // Consume up to and including the terminating NUL, leaving any
        // following fields in the stream.
        let left = stream.left();
        let amount = {
            let data = stream.peek(left)?;
            match data.iter().position(|&b| b == 0) {
                Some(idx) => idx as u64 + 1,
                None => left,
            }
        };
        let data = stream.read(amount)?;
        let mut s = String::with_capacity(data.len());
        for &b in data {
            s.push(b as char);
        }
        Ok(ZString(s))
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ZString {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut v = Vec::with_capacity(self.0.len());
        for c in self.0.chars() {
            if (c as u32) < 256 {
                v.push(c as u8);
            } else {
                v.push(0xff);
            }
        }
        stream.write(&v)
    }
}

impl Display for ZString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for ZString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "\"{}\"", self.as_str())
    }
}

/// Basically a blob of data.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Data {
    /// Read an exact number of bytes.
    pub fn read<R: ReadBytes>(stream: &mut R, count: usize) -> io::Result<Self> {
        let mut v = Vec::new();
        if count > 0 {
            v.extend_from_slice(stream.read(count as u64)?);
        }
        Ok(Data(v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Data {
    fn from(v: Vec<u8>) -> Data {
        Data(v)
    }
}

impl From<&[u8]> for Data {
    fn from(v: &[u8]) -> Data {
        Data(v.to_vec())
    }
}

impl FromBytes for Data {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let left = stream.left();
        Data::read(stream, left as usize)
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for Data {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        stream.write(&self.0[..])
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.0.len() <= 16 {
            let mut s = String::from("[");
            for (i, d) in self.0.iter().enumerate() {
                if i > 0 {
                    s.push(' ');
                }
                let _ = write!(s, "{:02x}", d);
            }
            s.push(']');
            write!(f, "{}", s)
        } else {
            write!(f, "[u8; {}]", self.0.len())
        }
    }
}

macro_rules! fixed_float {
    ($(#[$outer:meta])* $name:ident, $type:tt, $frac_bits:expr) => {
        #[derive(Clone, Copy, Default, PartialEq, Eq)]
        $(#[$outer])*
        pub struct $name(pub $type);
        def_from_to_bytes_newtype!($name, $type);

        impl $name {
            pub fn get(&self) -> f64 {
                (self.0 as f64) / ((1u64 << $frac_bits) as f64)
            }

            pub fn set(&mut self, value: f64) {
                let v = (value * ((1u64 << $frac_bits) as f64)).round();
                self.0 = if v > ($type::MAX as f64) {
                    $type::MAX
                } else if v < ($type::MIN as f64) {
                    $type::MIN
                } else {
                    v as $type
                };
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl From<f64> for $name {
            fn from(t: f64) -> $name {
                let mut x = $name(0);
                x.set(t);
                x
            }
        }

        impl From<$name> for f64 {
            fn from(t: $name) -> f64 {
                t.get()
            }
        }
    };
}

fixed_float!(
    /// 32 bits 2.30 fixed float.
    FixedFloat2_30,
    u32,
    30
);
fixed_float!(
    /// 32 bits 16.16 fixed float.
    FixedFloat16_16,
    u32,
    16
);
fixed_float!(
    /// 16 bits 8.8 fixed float.
    FixedFloat8_8,
    u16,
    8
);

/// Transformation matrix. Defaults to the identity matrix.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix([(FixedFloat16_16, FixedFloat16_16, FixedFloat2_30); 3]);

impl Default for Matrix {
    fn default() -> Matrix {
        Matrix([
            (FixedFloat16_16(0x10000), FixedFloat16_16(0), FixedFloat2_30(0)),
            (FixedFloat16_16(0), FixedFloat16_16(0x10000), FixedFloat2_30(0)),
            (FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0x40000000)),
        ])
    }
}

impl FromBytes for Matrix {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let mut m = [(FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0)); 3];
        for row in &mut m {
            *row = (
                FixedFloat16_16::from_bytes(stream)?,
                FixedFloat16_16::from_bytes(stream)?,
                FixedFloat2_30::from_bytes(stream)?,
            );
        }
        Ok(Matrix(m))
    }
    fn min_size() -> usize {
        36
    }
}

impl ToBytes for Matrix {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        for row in &self.0 {
            row.0.to_bytes(stream)?;
            row.1.to_bytes(stream)?;
            row.2.to_bytes(stream)?;
        }
        Ok(())
    }
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Matrix([{}][{}][{}] [{}][{}][{}] [{}][{}][{}])",
            self.0[0].0, self.0[0].1, self.0[0].2,
            self.0[1].0, self.0[1].1, self.0[1].2,
            self.0[2].0, self.0[2].1, self.0[2].2,
        )
    }
}

/// 8.8.3.1 Sample Flags (ISO/IEC 14496-12:2015(E))
///
/// The `sample_is_non_sync_sample` field provides the same information
/// as the sync sample table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SampleFlags {
    pub is_leading: u8,
    pub sample_depends_on: u8,
    pub sample_is_depended_on: u8,
    pub sample_has_redundancy: u8,
    pub sample_padding_value: u8,
    pub sample_is_non_sync_sample: bool,
    pub sample_degradation_priority: u16,
}

impl SampleFlags {
    /// All we usually know is "is this a sync sample".
    pub fn from_sync(is_sync: bool) -> SampleFlags {
        let mut flags = SampleFlags::default();
        if is_sync {
            flags.sample_depends_on = 2;
        } else {
            flags.sample_is_non_sync_sample = true;
        }
        flags
    }
}

impl FromBytes for SampleFlags {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let flags = u16::from_bytes(stream)?;
        let sample_degradation_priority = u16::from_bytes(stream)?;
        Ok(SampleFlags {
            is_leading: ((flags & 0b0000110000000000) >> 10) as u8,
            sample_depends_on: ((flags & 0b0000001100000000) >> 8) as u8,
            sample_is_depended_on: ((flags & 0b0000000011000000) >> 6) as u8,
            sample_has_redundancy: ((flags & 0b0000000000110000) >> 4) as u8,
            sample_padding_value: ((flags & 0b0000000000001110) >> 1) as u8,
            sample_is_non_sync_sample: (flags & 1) > 0,
            sample_degradation_priority,
        })
    }

    fn min_size() -> usize {
        4
    }
}

impl ToBytes for SampleFlags {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let flags = (((self.is_leading & 0b11) as u16) << 10)
            | (((self.sample_depends_on & 0b11) as u16) << 8)
            | (((self.sample_is_depended_on & 0b11) as u16) << 6)
            | (((self.sample_has_redundancy & 0b11) as u16) << 4)
            | (((self.sample_padding_value & 0b111) as u16) << 1)
            | self.sample_is_non_sync_sample as u16;
        flags.to_bytes(stream)?;
        self.sample_degradation_priority.to_bytes(stream)
    }
}

mod doc_hidden {
    pub trait FromPrimitive: Sized {
        fn from_usize(n: usize) -> Self;
    }
    impl FromPrimitive for () {
        fn from_usize(_n: usize) {}
    }
    impl FromPrimitive for u16 {
        fn from_usize(n: usize) -> u16 {
            n as u16
        }
    }
    impl FromPrimitive for u32 {
        fn from_usize(n: usize) -> u32 {
            n as u32
        }
    }

    pub trait ToPrimitive {
        fn to_usize(self) -> usize;
    }
    impl ToPrimitive for () {
        fn to_usize(self) -> usize {
            unimplemented!()
        }
    }
    impl ToPrimitive for u16 {
        fn to_usize(self) -> usize {
            self as usize
        }
    }
    impl ToPrimitive for u32 {
        fn to_usize(self) -> usize {
            self as usize
        }
    }
}

#[doc(hidden)]
pub use doc_hidden::*;

/// A mutable list of items.
///
/// The `N` type indicates whether the serialized form is prefixed with
/// an integer stating the number of elements:
///
/// - `()`: no size, elements run to the end of the box
/// - `u16`: 2 bytes count
/// - `u32`: 4 bytes count
pub struct Array<N, T> {
    vec: Vec<T>,
    count_type: std::marker::PhantomData<N>,
}

pub type ArraySized16<T> = Array<u16, T>;
pub type ArraySized32<T> = Array<u32, T>;
pub type ArrayUnsized<T> = Array<(), T>;

impl<N, T> Array<N, T> {
    pub fn new() -> Self {
        Self {
            vec: Vec::new(),
            count_type: std::marker::PhantomData,
        }
    }

    pub fn push(&mut self, value: T) {
        self.vec.push(value)
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }
}

impl<N, T> Default for Array<N, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, T> FromBytes for Array<N, T>
where
    N: FromBytes + ToPrimitive,
    T: FromBytes,
{
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let (mut v, count) = if mem::size_of::<N>() == 0 {
            (Vec::new(), u32::MAX as usize)
        } else {
            let sz = N::from_bytes(stream)?.to_usize();
            (Vec::with_capacity(sz.min(65536)), sz)
        };
        let min_size = T::min_size() as u64;
        while v.len() < count && stream.left() >= min_size && stream.left() > 0 {
            v.push(T::from_bytes(stream)?);
        }
        Ok(Self {
            vec: v,
            count_type: std::marker::PhantomData,
        })
    }

    fn min_size() -> usize {
        mem::size_of::<N>()
    }
}

impl<N, T> ToBytes for Array<N, T>
where
    N: ToBytes + FromPrimitive,
    T: ToBytes,
{
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        if mem::size_of::<N>() > 0 {
            N::from_usize(self.vec.len()).to_bytes(stream)?;
        }
        for elem in &self.vec {
            elem.to_bytes(stream)?;
        }
        Ok(())
    }
}

impl<N, T> FullBox for Array<N, T>
where
    T: FullBox,
{
    fn version(&self) -> Option<u8> {
        // Highest version any entry needs.
        let mut r = None;
        for e in &self.vec {
            if let Some(ver) = e.version() {
                if r.map(|r_ver| ver > r_ver).unwrap_or(true) {
                    r = Some(ver);
                }
            }
        }
        r
    }
}

impl<N, T> Clone for Array<N, T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            vec: self.vec.clone(),
            count_type: std::marker::PhantomData,
        }
    }
}

impl<N, T> Debug for Array<N, T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.vec, f)
    }
}

impl<N, T> std::ops::Deref for Array<N, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.vec
    }
}

impl<N, T> std::ops::DerefMut for Array<N, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.vec
    }
}

impl<'a, N, T> IntoIterator for &'a Array<N, T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.vec.iter()
    }
}

impl<N, T> std::iter::FromIterator<T> for Array<N, T> {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            vec: iter.into_iter().collect(),
            count_type: std::marker::PhantomData,
        }
    }
}
