//! Tagged buffer variants
//!
//! Buffers are created from type ids computed at graph-build time, so their
//! element type is only known at runtime. Instead of trait objects, the
//! runtime uses one closed enum per buffer kind with a variant per element
//! type; `typed` recovers the statically-typed buffer, failing with
//! `InvalidDataType` on a lane mismatch.

use crate::buffer::growing::GrowingBuffer;
use crate::buffer::typed::TypedBuffer;
use crate::error::{RadioError, Result};
use crate::radio::descriptors::LinkDescription;
use crate::types::{Complex, Sample, TypeId};
use std::sync::Arc;

macro_rules! for_each_lane {
    ($m:ident) => {
        $m! {
            (Uint8, u8),
            (Uint16, u16),
            (Uint32, u32),
            (Uint64, u64),
            (Int8, i8),
            (Int16, i16),
            (Int32, i32),
            (Int64, i64),
            (Float32, f32),
            (Float64, f64),
            (Float80, f64),
            (ComplexFloat32, Complex<f32>),
            (ComplexFloat64, Complex<f64>),
            (ComplexFloat80, Complex<f64>)
        }
    };
}

macro_rules! define_any_buffer {
    ($(($lane:ident, $ty:ty)),* $(,)?) => {
        /// A shared blocking buffer of any supported element type
        #[derive(Clone)]
        pub enum AnyBuffer {
            $( $lane(Arc<TypedBuffer<$ty>>), )*
        }

        impl AnyBuffer {
            /// Create a buffer for the given element type id
            pub fn create(type_id: TypeId) -> Result<AnyBuffer> {
                Ok(match type_id {
                    $( TypeId::$lane => {
                        AnyBuffer::$lane(Arc::new(TypedBuffer::with_type_id(type_id)?))
                    } )*
                })
            }

            pub fn type_id(&self) -> TypeId {
                match self { $( AnyBuffer::$lane(b) => b.type_id(), )* }
            }

            pub fn has_data(&self) -> bool {
                match self { $( AnyBuffer::$lane(b) => b.has_data(), )* }
            }

            pub fn set_link(&self, link: LinkDescription) {
                match self { $( AnyBuffer::$lane(b) => b.set_link(link), )* }
            }

            pub fn link(&self) -> LinkDescription {
                match self { $( AnyBuffer::$lane(b) => b.link(), )* }
            }

            /// Wake all blocked readers/writers with `Interrupted`
            pub fn interrupt(&self) {
                match self { $( AnyBuffer::$lane(b) => b.interrupt(), )* }
            }

            /// Re-arm after an interruption
            pub fn reset(&self) {
                match self { $( AnyBuffer::$lane(b) => b.reset(), )* }
            }
        }

        impl std::fmt::Debug for AnyBuffer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "AnyBuffer<{}>({})", self.type_id(), self.link())
            }
        }
    };
}
for_each_lane!(define_any_buffer);

macro_rules! define_any_growing {
    ($(($lane:ident, $ty:ty)),* $(,)?) => {
        /// A growing intra-engine buffer of any supported element type
        #[derive(Clone)]
        pub enum AnyGrowingBuffer {
            $( $lane(Arc<GrowingBuffer<$ty>>), )*
        }

        impl AnyGrowingBuffer {
            pub fn create(type_id: TypeId) -> Result<AnyGrowingBuffer> {
                Ok(match type_id {
                    $( TypeId::$lane => {
                        AnyGrowingBuffer::$lane(Arc::new(GrowingBuffer::with_type_id(type_id)?))
                    } )*
                })
            }

            pub fn type_id(&self) -> TypeId {
                match self { $( AnyGrowingBuffer::$lane(b) => b.type_id(), )* }
            }

            pub fn has_data(&self) -> bool {
                match self { $( AnyGrowingBuffer::$lane(b) => b.has_data(), )* }
            }

            pub fn set_link(&self, link: LinkDescription) {
                match self { $( AnyGrowingBuffer::$lane(b) => b.set_link(link), )* }
            }

            pub fn link(&self) -> LinkDescription {
                match self { $( AnyGrowingBuffer::$lane(b) => b.link(), )* }
            }
        }

        impl std::fmt::Debug for AnyGrowingBuffer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "AnyGrowingBuffer<{}>({})", self.type_id(), self.link())
            }
        }
    };
}
for_each_lane!(define_any_growing);

/// Recovers statically-typed buffers out of the tagged variants.
///
/// Implemented for every storage type; the 64-bit float storages also match
/// their 80-bit alias lanes.
pub trait BufferCast: Sample {
    fn cast_typed(any: &AnyBuffer) -> Option<&Arc<TypedBuffer<Self>>>;
    fn cast_growing(any: &AnyGrowingBuffer) -> Option<&Arc<GrowingBuffer<Self>>>;
}

macro_rules! impl_cast_single {
    ($(($lane:ident, $ty:ty)),* $(,)?) => {
        $(
            impl BufferCast for $ty {
                fn cast_typed(any: &AnyBuffer) -> Option<&Arc<TypedBuffer<$ty>>> {
                    match any {
                        AnyBuffer::$lane(b) => Some(b),
                        _ => None,
                    }
                }

                fn cast_growing(any: &AnyGrowingBuffer) -> Option<&Arc<GrowingBuffer<$ty>>> {
                    match any {
                        AnyGrowingBuffer::$lane(b) => Some(b),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_cast_single! {
    (Uint8, u8),
    (Uint16, u16),
    (Uint32, u32),
    (Uint64, u64),
    (Int8, i8),
    (Int16, i16),
    (Int32, i32),
    (Int64, i64),
    (Float32, f32),
    (ComplexFloat32, Complex<f32>),
}

impl BufferCast for f64 {
    fn cast_typed(any: &AnyBuffer) -> Option<&Arc<TypedBuffer<f64>>> {
        match any {
            AnyBuffer::Float64(b) | AnyBuffer::Float80(b) => Some(b),
            _ => None,
        }
    }

    fn cast_growing(any: &AnyGrowingBuffer) -> Option<&Arc<GrowingBuffer<f64>>> {
        match any {
            AnyGrowingBuffer::Float64(b) | AnyGrowingBuffer::Float80(b) => Some(b),
            _ => None,
        }
    }
}

impl BufferCast for Complex<f64> {
    fn cast_typed(any: &AnyBuffer) -> Option<&Arc<TypedBuffer<Complex<f64>>>> {
        match any {
            AnyBuffer::ComplexFloat64(b) | AnyBuffer::ComplexFloat80(b) => Some(b),
            _ => None,
        }
    }

    fn cast_growing(any: &AnyGrowingBuffer) -> Option<&Arc<GrowingBuffer<Complex<f64>>>> {
        match any {
            AnyGrowingBuffer::ComplexFloat64(b) | AnyGrowingBuffer::ComplexFloat80(b) => Some(b),
            _ => None,
        }
    }
}

impl AnyBuffer {
    /// Statically-typed view, or `InvalidDataType` on a lane mismatch
    pub fn typed<T: BufferCast>(&self) -> Result<&Arc<TypedBuffer<T>>> {
        T::cast_typed(self).ok_or_else(|| {
            RadioError::InvalidDataType(format!(
                "buffer carries {}, requested {}",
                self.type_id(),
                T::TYPE_ID
            ))
        })
    }
}

impl AnyGrowingBuffer {
    /// Statically-typed view, or `InvalidDataType` on a lane mismatch
    pub fn typed<T: BufferCast>(&self) -> Result<&Arc<GrowingBuffer<T>>> {
        T::cast_growing(self).ok_or_else(|| {
            RadioError::InvalidDataType(format!(
                "buffer carries {}, requested {}",
                self.type_id(),
                T::TYPE_ID
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ALL_TYPE_IDS;

    #[test]
    fn test_create_covers_every_type_id() {
        for tid in ALL_TYPE_IDS {
            let buf = AnyBuffer::create(tid).unwrap();
            assert_eq!(buf.type_id(), tid);
            let grow = AnyGrowingBuffer::create(tid).unwrap();
            assert_eq!(grow.type_id(), tid);
        }
    }

    #[test]
    fn test_typed_cast_checks_lane() {
        let buf = AnyBuffer::create(TypeId::Int32).unwrap();
        assert!(buf.typed::<i32>().is_ok());
        assert!(matches!(
            buf.typed::<f32>(),
            Err(RadioError::InvalidDataType(_))
        ));
    }

    #[test]
    fn test_alias_lanes_cast_to_their_storage() {
        let buf = AnyBuffer::create(TypeId::Float80).unwrap();
        let typed = buf.typed::<f64>().unwrap();
        assert_eq!(typed.type_id(), TypeId::Float80);
    }

    #[test]
    fn test_erased_round_trip_carries_data() {
        let any = AnyBuffer::create(TypeId::Uint16).unwrap();
        let writer = any.typed::<u16>().unwrap();
        writer.acquire_write(3).unwrap().data.copy_from_slice(&[7, 8, 9]);
        assert!(any.has_data());
        let reader = any.typed::<u16>().unwrap();
        assert_eq!(reader.acquire_read().unwrap().data.as_slice(), &[7, 8, 9]);
    }
}
