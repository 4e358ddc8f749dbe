//! Entry point inspection with naga.
//!
//! wgpu reports shader errors through its uncaptured-error handler, which
//! panics by default. Source is therefore parsed and validated here first,
//! so every compile failure comes back as a [`CompileError`].

use naga::valid::{Capabilities, ValidationFlags, Validator};

use crate::error::CompileError;

/// Buffer arguments of a compute entry point, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KernelSignature {
    pub entry_point: String,
    pub workgroup_size: [u32; 3],
    pub bindings: Vec<BindingSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BindingSlot {
    pub name: String,
    /// `var<storage, read_write>`; only these are copied back after a dispatch.
    pub writable: bool,
    /// Smallest buffer the binding accepts, in bytes. A runtime-sized array
    /// needs room for one element.
    pub min_size: u64,
}

pub(crate) fn inspect(source: &str, entry_point: &str) -> Result<KernelSignature, CompileError> {
    let module = naga::front::wgsl::parse_str(source)
        .map_err(|e| CompileError::Parse(e.emit_to_string(source)))?;

    let info = Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| CompileError::Validation(e.emit_to_string(source)))?;

    let (index, ep) = module
        .entry_points
        .iter()
        .enumerate()
        .find(|(_, ep)| ep.name == entry_point)
        .ok_or_else(|| CompileError::MissingEntryPoint(entry_point.to_string()))?;

    if ep.stage != naga::ShaderStage::Compute {
        return Err(CompileError::NotCompute(entry_point.to_string()));
    }

    // Only globals the entry point touches end up in the derived layout.
    let usage = info.get_entry_point(index);
    let mut slots = Vec::new();

    for (handle, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else { continue };
        if usage[handle].is_empty() {
            continue;
        }

        let name = var
            .name
            .clone()
            .unwrap_or_else(|| format!("binding{}", binding.binding));
        let unsupported = |reason| CompileError::UnsupportedBinding {
            name: name.clone(),
            group: binding.group,
            binding: binding.binding,
            reason,
        };

        if binding.group != 0 {
            return Err(unsupported("only @group(0) is bound"));
        }
        let writable = match var.space {
            naga::AddressSpace::Storage { access } => access.contains(naga::StorageAccess::STORE),
            _ => return Err(unsupported("only storage buffers can be bound")),
        };

        let min_size = module.types[var.ty]
            .inner
            .try_size(module.to_ctx())
            .map(u64::from)
            .ok_or_else(|| unsupported("binding type is too large"))?;

        slots.push((
            binding.binding,
            BindingSlot {
                name,
                writable,
                min_size,
            },
        ));
    }

    slots.sort_by_key(|(binding, _)| *binding);
    for (expected, (found, _)) in slots.iter().enumerate() {
        let expected = expected as u32;
        if *found != expected {
            return Err(CompileError::BindingGap {
                entry_point: entry_point.to_string(),
                missing: expected,
                found: *found,
            });
        }
    }

    Ok(KernelSignature {
        entry_point: entry_point.to_string(),
        workgroup_size: ep.workgroup_size,
        bindings: slots.into_iter().map(|(_, slot)| slot).collect(),
    })
}
