/*
Traits to handle dtype runtime polymorphism of decoded rasters
 */
use num_traits::ToPrimitive;
use tiff::decoder::DecodingResult;

// widen a typed pixel buffer into f64, whatever the storage dtype
pub trait WidenPixels {
    fn widen(self) -> Option<Vec<f64>>;
}

impl<T> WidenPixels for Vec<T>
where
    T: ToPrimitive + Copy,
{
    fn widen(self) -> Option<Vec<f64>> {
        self.iter().map(|v| v.to_f64()).collect()
    }
}

macro_rules! impl_widen_decoded {
    ($($variant:ident),* $(,)?) => {
        impl WidenPixels for DecodingResult {
            #[allow(unreachable_patterns)]
            fn widen(self) -> Option<Vec<f64>> {
                match self {
                    $(DecodingResult::$variant(buf) => buf.widen(),)*
                    _ => None,
                }
            }
        }
    };
}

impl_widen_decoded!(U8, U16, U32, U64, I8, I16, I32, I64, F32, F64);
