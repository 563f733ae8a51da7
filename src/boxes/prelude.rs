pub(crate) use crate::mp4box::{box_size, BoxHeader, BoxInfo, BoxReader, BoxWriter, FullBox, GenericBox};
pub(crate) use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
pub(crate) use crate::types::*;
