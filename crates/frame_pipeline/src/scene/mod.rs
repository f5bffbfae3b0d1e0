//! Fixed scene content: geometries, materials, textures and the render items
//! that tie them together.
//!
//! Entities refer to each other through index newtypes into the scene's
//! tables. Topology is fixed once [`SceneBuilder::build`] returns; afterwards
//! only per-entity constant data and dirty counters change.

mod demo_scene;
mod texture;

use bevy_math::Mat4;
use bevy_math::Vec3;
use bevy_math::Vec4;

use crate::backend::DrawArgs;
use crate::constants::gpu_matrix;
use crate::constants::MaterialConstants;
use crate::constants::ObjectConstants;
use crate::frame_ring::FRAME_RESOURCE_COUNT;
use crate::geometry::Geometry;

pub use demo_scene::demo_scene;
pub use demo_scene::DEMO_TEXTURE_FILES;
pub use texture::Texture;
pub use texture::TextureError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderItemId(pub usize);

/// Draw buckets, recorded in this order, each with its own pipeline state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    AlphaTested,
    Transparent,
}

impl RenderLayer {
    pub const ALL: [RenderLayer; 3] = [
        RenderLayer::Opaque,
        RenderLayer::AlphaTested,
        RenderLayer::Transparent,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Slot in every frame's material constant buffer.
    pub mat_cb_index: u32,
    /// Position in the shared texture view block.
    pub diffuse_srv_index: u32,
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub base_color: Vec4,
    pub ambient_strength: f32,
    pub specular_strength: f32,
    pub mat_transform: Mat4,
    /// Ring slots still holding a stale copy of this material.
    pub num_frames_dirty: usize,
}

impl Material {
    pub fn new(name: impl Into<String>, diffuse: TextureId) -> Self {
        Self {
            name: name.into(),
            mat_cb_index: 0,
            diffuse_srv_index: diffuse.0 as u32,
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            base_color: Vec4::ONE,
            ambient_strength: 1.0,
            specular_strength: 1.0,
            mat_transform: Mat4::IDENTITY,
            num_frames_dirty: FRAME_RESOURCE_COUNT,
        }
    }

    pub fn mark_dirty(&mut self) {
        self.num_frames_dirty = FRAME_RESOURCE_COUNT;
    }

    pub fn to_constants(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.diffuse_albedo.to_array(),
            fresnel_r0: self.fresnel_r0.to_array(),
            roughness: self.roughness,
            base_color: self.base_color.to_array(),
            ambient_strength: self.ambient_strength,
            specular_strength: self.specular_strength,
            _pad: [0.0; 2],
            mat_transform: gpu_matrix(&self.mat_transform),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderItem {
    pub name: String,
    pub world: Mat4,
    pub tex_transform: Mat4,
    /// Ring slots still holding a stale copy of this item's transforms.
    pub num_frames_dirty: usize,
    /// Slot in every frame's object constant buffer.
    pub obj_cb_index: u32,
    pub material: Option<MaterialId>,
    pub geometry: GeometryId,
    pub submesh: String,
    /// Resolved from `submesh` when the scene is built; `None` if it is missing.
    pub draw_args: Option<DrawArgs>,
}

impl RenderItem {
    pub fn new(name: impl Into<String>, geometry: GeometryId, submesh: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
            num_frames_dirty: FRAME_RESOURCE_COUNT,
            obj_cb_index: 0,
            material: None,
            geometry,
            submesh: submesh.into(),
            draw_args: None,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.world = world;
        self
    }

    pub fn with_tex_transform(mut self, tex_transform: Mat4) -> Self {
        self.tex_transform = tex_transform;
        self
    }

    pub fn with_material(mut self, material: MaterialId) -> Self {
        self.material = Some(material);
        self
    }

    pub fn mark_dirty(&mut self) {
        self.num_frames_dirty = FRAME_RESOURCE_COUNT;
    }

    pub fn to_constants(&self) -> ObjectConstants {
        ObjectConstants {
            world: gpu_matrix(&self.world),
            tex_transform: gpu_matrix(&self.tex_transform),
        }
    }
}

/// Everything a render item needs to be drawn. Produced only when every
/// reference the item holds resolves.
#[derive(Clone, Copy, Debug)]
pub struct ResolvedItem<'a> {
    pub item: &'a RenderItem,
    pub material: &'a Material,
    pub geometry: GeometryId,
    pub draw_args: DrawArgs,
}

/// Why a render item cannot be drawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnresolvedItem {
    NoMaterial,
    UnknownMaterial(MaterialId),
    UnknownGeometry(GeometryId),
    UnknownSubmesh(String),
    UnknownTexture(u32),
    /// `obj_cb_index` is past the end of the object constant buffers.
    ObjectSlotOutOfRange { index: u32, capacity: usize },
    MaterialSlotOutOfRange { index: u32, capacity: usize },
}

impl std::fmt::Display for UnresolvedItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnresolvedItem::NoMaterial => write!(f, "no material assigned"),
            UnresolvedItem::UnknownMaterial(id) => write!(f, "material {} does not exist", id.0),
            UnresolvedItem::UnknownGeometry(id) => write!(f, "geometry {} does not exist", id.0),
            UnresolvedItem::UnknownSubmesh(name) => write!(f, "submesh {name:?} does not exist"),
            UnresolvedItem::UnknownTexture(index) => {
                write!(f, "diffuse texture {index} does not exist")
            }
            UnresolvedItem::ObjectSlotOutOfRange { index, capacity } => {
                write!(f, "object slot {index} is outside {capacity} object constants")
            }
            UnresolvedItem::MaterialSlotOutOfRange { index, capacity } => {
                write!(f, "material slot {index} is outside {capacity} material constants")
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Scene {
    geometries: Vec<Geometry>,
    materials: Vec<Material>,
    textures: Vec<Texture>,
    items: Vec<RenderItem>,
    layers: [Vec<RenderItemId>; 3],
}

impl Scene {
    pub fn object_count(&self) -> usize {
        self.items.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut [Material] {
        &mut self.materials
    }

    pub fn textures(&self) -> &[Texture] {
        &self.textures
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [RenderItem] {
        &mut self.items
    }

    pub fn item(&self, id: RenderItemId) -> Option<&RenderItem> {
        self.items.get(id.0)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn geometry(&self, id: GeometryId) -> Option<&Geometry> {
        self.geometries.get(id.0)
    }

    /// Items drawn with `layer`'s pipeline state, in draw order.
    pub fn layer(&self, layer: RenderLayer) -> &[RenderItemId] {
        &self.layers[layer.index()]
    }

    pub fn find_item(&self, name: &str) -> Option<RenderItemId> {
        self.items
            .iter()
            .position(|item| item.name == name)
            .map(RenderItemId)
    }

    pub fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials
            .iter()
            .position(|material| material.name == name)
            .map(MaterialId)
    }

    /// Replace an item's world transform and re-arm its dirty counter.
    pub fn set_world(&mut self, id: RenderItemId, world: Mat4) -> bool {
        match self.items.get_mut(id.0) {
            Some(item) => {
                item.world = world;
                item.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Apply `edit` to a material and re-arm its dirty counter.
    pub fn edit_material(&mut self, id: MaterialId, edit: impl FnOnce(&mut Material)) -> bool {
        match self.materials.get_mut(id.0) {
            Some(material) => {
                edit(material);
                material.mark_dirty();
                true
            }
            None => false,
        }
    }

    /// Check every reference `id` holds.
    pub fn resolve(&self, id: RenderItemId) -> Option<Result<ResolvedItem<'_>, UnresolvedItem>> {
        let item = self.items.get(id.0)?;
        Some(self.resolve_item(item))
    }

    fn resolve_item<'a>(&'a self, item: &'a RenderItem) -> Result<ResolvedItem<'a>, UnresolvedItem> {
        if item.obj_cb_index as usize >= self.items.len() {
            return Err(UnresolvedItem::ObjectSlotOutOfRange {
                index: item.obj_cb_index,
                capacity: self.items.len(),
            });
        }
        let material_id = item.material.ok_or(UnresolvedItem::NoMaterial)?;
        let material = self
            .material(material_id)
            .ok_or(UnresolvedItem::UnknownMaterial(material_id))?;
        if material.mat_cb_index as usize >= self.materials.len() {
            return Err(UnresolvedItem::MaterialSlotOutOfRange {
                index: material.mat_cb_index,
                capacity: self.materials.len(),
            });
        }
        if material.diffuse_srv_index as usize >= self.textures.len() {
            return Err(UnresolvedItem::UnknownTexture(material.diffuse_srv_index));
        }
        self.geometry(item.geometry)
            .ok_or(UnresolvedItem::UnknownGeometry(item.geometry))?;
        let draw_args = item
            .draw_args
            .ok_or_else(|| UnresolvedItem::UnknownSubmesh(item.submesh.clone()))?;
        Ok(ResolvedItem {
            item,
            material,
            geometry: item.geometry,
            draw_args,
        })
    }
}

/// Collects scene content and hands out constant buffer slots in insertion order.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    scene: Scene,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_geometry(&mut self, geometry: Geometry) -> GeometryId {
        self.scene.geometries.push(geometry);
        GeometryId(self.scene.geometries.len() - 1)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.scene.textures.push(texture);
        TextureId(self.scene.textures.len() - 1)
    }

    pub fn add_material(&mut self, mut material: Material) -> MaterialId {
        material.mat_cb_index = self.scene.materials.len() as u32;
        material.num_frames_dirty = FRAME_RESOURCE_COUNT;
        self.scene.materials.push(material);
        MaterialId(self.scene.materials.len() - 1)
    }

    pub fn add_item(&mut self, layer: RenderLayer, mut item: RenderItem) -> RenderItemId {
        item.obj_cb_index = self.scene.items.len() as u32;
        item.num_frames_dirty = FRAME_RESOURCE_COUNT;
        item.draw_args = self
            .scene
            .geometries
            .get(item.geometry.0)
            .and_then(|geometry| geometry.submesh(&item.submesh))
            .map(|submesh| submesh.draw_args());
        let id = RenderItemId(self.scene.items.len());
        self.scene.items.push(item);
        self.scene.layers[layer.index()].push(id);
        id
    }

    pub fn build(self) -> Scene {
        self.scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::room;

    fn builder_with_room() -> (SceneBuilder, GeometryId, MaterialId) {
        let mut builder = SceneBuilder::new();
        let geometry = builder.add_geometry(room());
        let texture = builder.add_texture(Texture::solid("white", [255; 4]));
        let material = builder.add_material(Material::new("plain", texture));
        (builder, geometry, material)
    }

    #[test]
    fn builder_assigns_slots_in_insertion_order() {
        let (mut builder, geometry, material) = builder_with_room();
        let second = builder.add_material(Material::new("second", TextureId(0)));
        let floor = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("floor", geometry, "floor").with_material(material),
        );
        let mirror = builder.add_item(
            RenderLayer::Transparent,
            RenderItem::new("mirror", geometry, "mirror").with_material(second),
        );
        let scene = builder.build();

        assert_eq!(scene.material(second).map(|m| m.mat_cb_index), Some(1));
        assert_eq!(scene.item(floor).map(|i| i.obj_cb_index), Some(0));
        assert_eq!(scene.item(mirror).map(|i| i.obj_cb_index), Some(1));
        assert_eq!(scene.layer(RenderLayer::Transparent), &[mirror]);
        assert_eq!(
            scene.item(mirror).and_then(|i| i.draw_args),
            Some(DrawArgs {
                index_count: 6,
                start_index_location: 24,
                base_vertex_location: 0,
            })
        );
    }

    #[test]
    fn broken_references_do_not_resolve() {
        let (mut builder, geometry, material) = builder_with_room();
        let no_material = builder.add_item(RenderLayer::Opaque, RenderItem::new("a", geometry, "floor"));
        let bad_submesh = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("b", geometry, "ceiling").with_material(material),
        );
        let bad_geometry = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("c", GeometryId(7), "floor").with_material(material),
        );
        let bad_material = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("d", geometry, "floor").with_material(MaterialId(9)),
        );
        let scene = builder.build();

        let reason = |id| scene.resolve(id).and_then(Result::err);
        assert_eq!(reason(no_material), Some(UnresolvedItem::NoMaterial));
        assert_eq!(
            reason(bad_submesh),
            Some(UnresolvedItem::UnknownSubmesh("ceiling".to_owned()))
        );
        assert_eq!(reason(bad_geometry), Some(UnresolvedItem::UnknownGeometry(GeometryId(7))));
        assert_eq!(reason(bad_material), Some(UnresolvedItem::UnknownMaterial(MaterialId(9))));
        assert!(scene.resolve(RenderItemId(99)).is_none());
    }

    #[test]
    fn constant_slots_past_the_buffers_do_not_resolve() {
        let (mut builder, geometry, material) = builder_with_room();
        let item = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("floor", geometry, "floor").with_material(material),
        );
        let mut scene = builder.build();

        scene.items_mut()[0].obj_cb_index = 1;
        assert_eq!(
            scene.resolve(item).and_then(Result::err),
            Some(UnresolvedItem::ObjectSlotOutOfRange {
                index: 1,
                capacity: 1
            })
        );

        scene.items_mut()[0].obj_cb_index = 0;
        scene.materials_mut()[0].mat_cb_index = 50;
        assert_eq!(
            scene.resolve(item).and_then(Result::err),
            Some(UnresolvedItem::MaterialSlotOutOfRange {
                index: 50,
                capacity: 1
            })
        );
    }

    #[test]
    fn edits_rearm_dirty_counters() {
        let (mut builder, geometry, material) = builder_with_room();
        let item = builder.add_item(
            RenderLayer::Opaque,
            RenderItem::new("floor", geometry, "floor").with_material(material),
        );
        let mut scene = builder.build();
        scene.items_mut()[0].num_frames_dirty = 0;
        scene.materials_mut()[0].num_frames_dirty = 0;

        assert!(scene.set_world(item, Mat4::from_translation(Vec3::X)));
        assert!(scene.edit_material(material, |m| m.roughness = 0.9));
        assert_eq!(scene.items()[0].num_frames_dirty, FRAME_RESOURCE_COUNT);
        assert_eq!(scene.materials()[0].num_frames_dirty, FRAME_RESOURCE_COUNT);
        assert!(!scene.set_world(RenderItemId(5), Mat4::IDENTITY));
    }
}
