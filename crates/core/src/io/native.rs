//! Native GeoTIFF reading/writing built on the `tiff` crate.
//!
//! Georeferencing is carried by ModelPixelScale + ModelTiepoint (north-up
//! grids only) and the no-data value by the GDAL_NODATA ASCII tag, which
//! is what GDAL, rasterio and QGIS read back.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{self, ColorType};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;

/// Sample type written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    UInt8,
    Int32,
    #[default]
    Float32,
    Float64,
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    pub sample_type: SampleType,
}

impl GeoTiffOptions {
    /// Options for 0/1/2 masks and class rasters
    pub fn mask() -> Self {
        Self {
            sample_type: SampleType::UInt8,
        }
    }
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file, band)
}

/// Read a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T>(data: &[u8], band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data), band)
}

fn tiff_err(context: &str) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Other(format!("{}: {}", context, e))
}

macro_rules! cast_buffer {
    ($buf:expr) => {
        $buf.iter()
            .map(|&v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
            .collect()
    };
}

fn decode_geotiff<T, R>(reader: R, band: Option<usize>) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    if let Some(b) = band.filter(|&b| b > 1) {
        return Err(Error::invalid_parameter("band", b, "only single-band rasters are supported"));
    }

    let mut decoder = Decoder::new(reader).map_err(tiff_err("TIFF decode error"))?;
    let (width, height) = decoder
        .dimensions()
        .map_err(tiff_err("Cannot read dimensions"))?;
    let (rows, cols) = (height as usize, width as usize);

    let data: Vec<T> = match decoder
        .read_image()
        .map_err(tiff_err("Cannot read image data"))?
    {
        DecodingResult::U8(buf) => cast_buffer!(buf),
        DecodingResult::U16(buf) => cast_buffer!(buf),
        DecodingResult::U32(buf) => cast_buffer!(buf),
        DecodingResult::U64(buf) => cast_buffer!(buf),
        DecodingResult::I8(buf) => cast_buffer!(buf),
        DecodingResult::I16(buf) => cast_buffer!(buf),
        DecodingResult::I32(buf) => cast_buffer!(buf),
        DecodingResult::I64(buf) => cast_buffer!(buf),
        DecodingResult::F32(buf) => cast_buffer!(buf),
        DecodingResult::F64(buf) => cast_buffer!(buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f64>().ok())
        .and_then(|v| num_traits::cast::<f64, T>(v).or_else(|| v.is_nan().then(T::default_nodata)));
    raster.set_nodata(nodata);
    raster.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));

    Ok(raster)
}

/// EPSG code from the GeoKey directory (ProjectedCSType, then GeographicType)
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).ok()?;
    let entries: Vec<&[u32]> = keys.get(4..)?.chunks_exact(4).collect();
    [3072, 2048].into_iter().find_map(|id| {
        entries
            .iter()
            .find(|e| e[0] == id && e[1] == 0 && e[3] != 0 && e[3] != 32767)
            .map(|e| e[3])
    })
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok()?;
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        return None;
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]))
}

/// Write a Raster to a GeoTIFF file
pub fn write_geotiff<T, P>(
    raster: &Raster<T>,
    path: P,
    options: Option<GeoTiffOptions>,
) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, options.unwrap_or_default())?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T>(
    raster: &Raster<T>,
    options: Option<GeoTiffOptions>,
) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), options.unwrap_or_default())?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err("TIFF encoder error"))?;
    let nodata = raster
        .nodata()
        .and_then(|v| v.to_f64())
        .map(|v| if v.is_nan() { "nan".to_string() } else { v.to_string() });

    match options.sample_type {
        SampleType::UInt8 => {
            let data: Vec<u8> = convert(raster, 0u8);
            encode_image::<colortype::Gray8, _, _>(&mut encoder, raster, nodata, &data)
        }
        SampleType::Int32 => {
            let data: Vec<i32> = convert(raster, i32::MIN);
            encode_image::<colortype::GrayI32, _, _>(&mut encoder, raster, nodata, &data)
        }
        SampleType::Float32 => {
            let data: Vec<f32> = convert(raster, f32::NAN);
            encode_image::<colortype::Gray32Float, _, _>(&mut encoder, raster, nodata, &data)
        }
        SampleType::Float64 => {
            let data: Vec<f64> = convert(raster, f64::NAN);
            encode_image::<colortype::Gray64Float, _, _>(&mut encoder, raster, nodata, &data)
        }
    }
}

fn convert<T: RasterElement, U: num_traits::NumCast + Copy>(raster: &Raster<T>, fallback: U) -> Vec<U> {
    raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(fallback))
        .collect()
}

fn encode_image<C, T, W>(
    encoder: &mut TiffEncoder<W>,
    raster: &Raster<T>,
    nodata: Option<String>,
    data: &[C::Inner],
) -> Result<()>
where
    C: ColorType,
    T: RasterElement,
    W: Write + Seek,
    [C::Inner]: TiffValue,
{
    let (rows, cols) = raster.shape();
    let gt = raster.transform();

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(tiff_err("Cannot create TIFF image"))?;

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(tiff_err("Cannot write scale tag"))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(tiff_err("Cannot write tiepoint tag"))?;

    // GeoKey directory v1.1.0: model type + raster-is-area, plus the EPSG code when known.
    let epsg = raster.crs().and_then(|c| c.epsg()).and_then(|c| u16::try_from(c).ok());
    let model_type: u16 = if epsg == Some(4326) { 2 } else { 1 };
    let mut geokeys: Vec<u16> = vec![1, 1, 0, 2, 1024, 0, 1, model_type, 1025, 0, 1, 1];
    if let Some(code) = epsg {
        geokeys[3] = 3;
        let key = if model_type == 2 { 2048 } else { 3072 };
        geokeys.extend_from_slice(&[key, 0, 1, code]);
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])
        .map_err(tiff_err("Cannot write geokey tag"))?;

    if let Some(nodata) = nodata {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.as_str())
            .map_err(tiff_err("Cannot write nodata tag"))?;
    }

    image
        .write_data(data)
        .map_err(tiff_err("Cannot write image data"))?;

    Ok(())
}
